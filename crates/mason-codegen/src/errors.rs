//! Error types for lowering and assembly.

use derive_more::Display;

pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Debug, Display, derive_more::Error)]
pub enum CodegenError {
    /// Only `Impl` results are deliverables; a bare polynomial cannot be
    /// lowered on its own.
    #[display("construction deliverable must be an implementation, found {kind}")]
    NotAnImplementation { kind: String },

    #[display("block {index} consumes undeclared name '{name}'")]
    UnboundName { index: usize, name: String },

    #[display("name '{name}' is declared twice")]
    DuplicateName { name: String },

    #[display("case arm result '{name}' is never produced")]
    MissingArmResult { name: String },
}
