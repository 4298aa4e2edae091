//! mason: synthesizes fast, domain-verified C implementations of scalar
//! math functions from a catalogue of proven building blocks.

pub mod constructions;
pub mod pipeline;

pub use mason_core::{Db, MasonDatabaseImpl, SourceFile};
pub use pipeline::{Artifacts, PipelineError, compile, write_artifacts};
