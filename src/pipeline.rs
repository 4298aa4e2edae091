//! Construction pipeline: check, lower, and assemble into C artifacts.

use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, From};
use tracing::info;

use mason_codegen::{
    CodegenError, assemble_error_main, assemble_functions, assemble_header, assemble_timing_main,
    generate_c, generate_mpfr_c, lower, needs_cody_waite,
};
use mason_transforms::{CheckError, IdentityTable, Node, type_check};

pub const HEADER_FILE: &str = "funcs.h";

/// Everything the pipeline produces for one construction.
#[derive(Debug)]
pub struct Artifacts {
    pub name: String,
    pub header: Vec<String>,
    pub functions: Vec<String>,
    pub error_main: Vec<String>,
    pub timing_main: Vec<String>,
}

#[derive(Debug, Display, From)]
pub enum PipelineError {
    #[display("{_0}")]
    Check(CheckError),
    #[display("{_0}")]
    Codegen(CodegenError),
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Check(e) => Some(e),
            PipelineError::Codegen(e) => Some(e),
        }
    }
}

/// Check and lower `construction`, then assemble the generated function,
/// its MPFR oracle, the shared header, and both measurement drivers.
pub fn compile<'db>(
    db: &'db dyn salsa::Database,
    table: &IdentityTable<'db>,
    construction: &Node<'db>,
    name: &str,
    domains: &[(f64, f64)],
) -> Result<Artifacts, PipelineError> {
    let typed = type_check(db, table, construction)?;
    info!(out_type = %typed.out_type.describe(db), "construction checked");

    let lowered = lower(db, &typed)?;
    let (sig, body) = generate_c(db, &lowered, name);

    let oracle_name = format!("{name}_oracle");
    let (oracle_sig, oracle_body) = generate_mpfr_c(db, lowered.function, &oracle_name);

    let header = assemble_header(&[oracle_sig, sig]);
    let functions = assemble_functions(
        &[oracle_body, body],
        HEADER_FILE,
        needs_cody_waite(&lowered.blocks),
    );
    let error_main = assemble_error_main(
        name,
        &oracle_name,
        &[name.to_string()],
        &[construction.describe(db)],
        HEADER_FILE,
        domains,
    );
    let timing_main = assemble_timing_main(name, &[name.to_string()], HEADER_FILE, domains);

    Ok(Artifacts {
        name: name.to_string(),
        header,
        functions,
        error_main,
        timing_main,
    })
}

/// Write the artifact files into `dir`, returning the paths written.
pub fn write_artifacts(artifacts: &Artifacts, dir: &Path) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let files = [
        (HEADER_FILE, &artifacts.header),
        ("funcs.c", &artifacts.functions),
        ("error_main.c", &artifacts.error_main),
        ("timing_main.c", &artifacts.timing_main),
    ];
    let mut written = Vec::new();
    for (fname, lines) in files {
        let path = dir.join(fname);
        std::fs::write(&path, lines.join("\n") + "\n")?;
        written.push(path);
    }
    Ok(written)
}
