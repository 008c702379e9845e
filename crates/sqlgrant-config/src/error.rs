use sqlgrant_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid YAML: {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid connection settings in {path}: {message}")]
    Connection { path: String, message: String },

    /// Neither the connection file nor the environment supplies a secret.
    #[error("{path}: auth.{field} is not set and {env} is empty")]
    MissingSecret {
        path: String,
        field: &'static str,
        env: &'static str,
    },

    /// A manifest entry that does not describe a resource.
    #[error("{path}: resources[{index}]: {message}")]
    Manifest {
        path: String,
        index: usize,
        message: String,
    },

    /// A manifest entry naming an object the server would refuse.
    #[error("{path}: resources[{index}]: {source}")]
    InvalidName {
        path: String,
        index: usize,
        #[source]
        source: DomainError,
    },
}
