//! Error types for construction checking.

use derive_more::{Display, From};

pub type CheckResult<T> = Result<T, CheckError>;

#[derive(Debug, Display, From)]
#[display("{kind}")]
pub struct CheckError {
    #[from]
    kind: Box<CheckErrorKind>,
}

impl<E> From<E> for CheckError
where
    CheckErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        CheckError {
            kind: Box::new(CheckErrorKind::from(error)),
        }
    }
}

impl CheckError {
    pub fn kind(&self) -> &CheckErrorKind {
        &self.kind
    }

    pub fn domain(msg: impl std::fmt::Display) -> Self {
        CheckErrorKind::Domain(msg.to_string()).into()
    }

    pub fn type_mismatch(
        context: &'static str,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        CheckErrorKind::TypeMismatch {
            context,
            expected,
            found,
        }
        .into()
    }

    pub fn precondition(msg: impl std::fmt::Display) -> Self {
        CheckErrorKind::Precondition(msg.to_string()).into()
    }

    pub fn incomplete(msg: impl std::fmt::Display) -> Self {
        CheckErrorKind::Incomplete(msg.to_string()).into()
    }
}

#[derive(Debug, Display)]
pub enum CheckErrorKind {
    /// An interval was constructed or queried outside its contract.
    #[display("domain error: {_0}")]
    Domain(String),

    /// A transform received an input of the wrong result kind.
    #[display("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A transform-specific soundness condition failed.
    #[display("precondition violated: {_0}")]
    Precondition(String),

    /// A hole (or otherwise unresolvable node) remains in the tree.
    #[display("incomplete construction: {_0}")]
    Incomplete(String),
}

impl std::error::Error for CheckError {}
