use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid resource id '{id}': expected {expected}")]
    InvalidResourceId { id: String, expected: &'static str },

    #[error("invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },

    #[error("invalid name '{0}': must be between 1 and 128 characters")]
    InvalidName(String),

    #[error("invalid Azure AD object id '{0}': expected a GUID")]
    InvalidObjectId(String),

    #[error("invalid login SID '{0}': expected 0x-prefixed hex")]
    InvalidSid(String),

    #[error("invalid permission name '{0}'")]
    InvalidPermission(String),

    #[error("invalid collation '{0}'")]
    InvalidCollation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
