use std::path::{Path, PathBuf};

use dashmap::{DashMap, Entry};

#[salsa::input(debug)]
pub struct SourceFile {
    #[returns(ref)]
    pub path: PathBuf,
    #[returns(ref)]
    pub text: String,
}

impl SourceFile {
    /// Create a SourceFile directly from a path and its contents
    /// (convenience for CLI/tests).
    pub fn from_path(db: &dyn salsa::Database, path: impl AsRef<Path>, text: String) -> Self {
        Self::new(db, path.as_ref().to_path_buf(), text)
    }
}

#[salsa::db]
pub trait Db: salsa::Database {
    fn input(
        &self,
        path: PathBuf,
    ) -> Result<SourceFile, Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Default, Clone)]
#[salsa::db]
pub struct MasonDatabaseImpl {
    storage: salsa::Storage<Self>,
    /// Cache of loaded source files, keyed by canonical path.
    files: DashMap<PathBuf, SourceFile>,
}

#[salsa::db]
impl salsa::Database for MasonDatabaseImpl {}

#[salsa::db]
impl Db for MasonDatabaseImpl {
    fn input(
        &self,
        path: PathBuf,
    ) -> Result<SourceFile, Box<dyn std::error::Error + Send + Sync>> {
        let path = path.canonicalize()?;
        Ok(match self.files.entry(path.clone()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let text = std::fs::read_to_string(&path)?;
                *entry.insert(SourceFile::new(self, path, text))
            }
        })
    }
}
