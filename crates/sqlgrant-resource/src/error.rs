use std::fmt;

use sqlgrant_domain::{DomainError, ResourceModel};
use sqlgrant_sql::SqlError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Server and driver errors keep their original text.
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// A statement succeeded but reading the object back does not show its effect.
    #[error("{kind} {field} reads back as '{found}' after changing it to '{expected}'")]
    NotApplied {
        kind: &'static str,
        field: &'static str,
        expected: String,
        found: String,
    },
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    NotFound,
    TypeMismatch,
    SqlExecution,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::NotFound => "not_found",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::SqlExecution => "sql_execution",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl ResourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::Configuration(_) | ResourceError::Domain(_) => ErrorKind::Configuration,
            ResourceError::NotApplied { .. } => ErrorKind::SqlExecution,
            ResourceError::Sql(e) => match e {
                SqlError::NotFound { .. } => ErrorKind::NotFound,
                SqlError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
                // A key matching several principals cannot be resolved by retrying.
                SqlError::Ambiguous { .. } | SqlError::Domain(_) => ErrorKind::Configuration,
                SqlError::Cancelled(_) => ErrorKind::Cancelled,
                SqlError::Execution(_) | SqlError::Decode(_) | SqlError::Connection(_) => {
                    ErrorKind::SqlExecution
                }
            },
        }
    }

    /// Resolution failed because the object is gone; the caller should recreate it.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// A failed operation together with whatever state it recorded before
/// failing, so the caller can persist partial progress.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ProvisionError {
    pub state: Option<ResourceModel>,
    #[source]
    pub source: ResourceError,
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

impl From<ResourceError> for ProvisionError {
    fn from(source: ResourceError) -> Self {
        Self { state: None, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let cases = [
            (ResourceError::Configuration("x".into()), ErrorKind::Configuration),
            (DomainError::InvalidName(String::new()).into(), ErrorKind::Configuration),
            (SqlError::not_found("schema", 3).into(), ErrorKind::NotFound),
            (SqlError::type_mismatch(3, "user", "database role").into(), ErrorKind::TypeMismatch),
            (SqlError::Execution("boom".into()).into(), ErrorKind::SqlExecution),
            (SqlError::Connection("reset".into()).into(), ErrorKind::SqlExecution),
            (SqlError::Cancelled("deadline".into()).into(), ErrorKind::Cancelled),
            (SqlError::Domain(DomainError::InvalidSid("x".into())).into(), ErrorKind::Configuration),
            (
                ResourceError::NotApplied {
                    kind: "schema",
                    field: "owner_id",
                    expected: "5".into(),
                    found: "1".into(),
                },
                ErrorKind::SqlExecution,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn server_text_is_preserved() {
        let err: ResourceError =
            SqlError::Execution("Cannot drop the role 'r', because it does not exist".into()).into();
        assert_eq!(err.to_string(), "Cannot drop the role 'r', because it does not exist");
    }
}
