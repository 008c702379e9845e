mod raw;
mod loader;
pub mod error;

pub use loader::{load_connection, load_manifests, parse_connection, parse_manifest, PASSWORD_ENV, TOKEN_ENV};
pub use error::ConfigError;
