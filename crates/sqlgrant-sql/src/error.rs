use sqlgrant_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("{kind} '{key}' does not exist")]
    NotFound { kind: &'static str, key: String },

    #[error("'{key}' is a {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },

    #[error("{kind} '{key}' matches more than one principal")]
    Ambiguous { kind: &'static str, key: String },

    /// Driver or server error, message passed through verbatim.
    #[error("{0}")]
    Execution(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("unexpected result shape: {0}")]
    Decode(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SqlError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        SqlError::NotFound { kind, key: key.to_string() }
    }

    pub fn type_mismatch(
        key: impl ToString,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        SqlError::TypeMismatch {
            key: key.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
