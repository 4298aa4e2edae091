//! Shared substrate for the mason synthesizer.
pub mod database;
pub mod diagnostic;
pub mod names;
pub mod numeric;

pub use database::{Db, MasonDatabaseImpl, SourceFile};
pub use diagnostic::{CompilationPhase, Diagnostic, DiagnosticSeverity, Span};
pub use names::NameGen;
pub use numeric::{NumericFormat, c_literal, split_constant, split_residual};
