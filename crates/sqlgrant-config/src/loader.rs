use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlgrant_domain::{validate_name, DomainError, ResourceModel};
use sqlgrant_sql::{TdsAuth, TdsConfig};
use tracing::debug;

use crate::error::ConfigError;
use crate::raw::{RawAuth, RawConnection, RawManifest};

/// Overrides `auth.password` of SQL authentication.
pub const PASSWORD_ENV: &str = "SQLGRANT_PASSWORD";
/// Overrides `auth.token` of Azure AD token authentication.
pub const TOKEN_ENV: &str = "SQLGRANT_AAD_TOKEN";

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

// ── Connection ───────────────────────────────────────────────────────────────

/// Load a connection file, letting the process environment supply or
/// override secrets.
pub fn load_connection(path: &Path) -> Result<TdsConfig, ConfigError> {
    let content = read(path)?;
    debug!("Loading connection from {}", path.display());
    parse_connection(&content, path, |key| std::env::var(key).ok())
}

/// Parse connection YAML. `env` is consulted for [`PASSWORD_ENV`] and
/// [`TOKEN_ENV`]; a non-empty value wins over the file.
pub fn parse_connection(
    content: &str,
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<TdsConfig, ConfigError> {
    let raw: RawConnection = serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;

    if raw.host.trim().is_empty() {
        return Err(ConfigError::Connection {
            path: path.display().to_string(),
            message: "host must not be empty".into(),
        });
    }

    let from_env = |key: &str| env(key).filter(|v| !v.is_empty());
    let auth = match raw.auth {
        RawAuth::Sql { username, password } => {
            let password = from_env(PASSWORD_ENV).or(password).ok_or_else(|| ConfigError::MissingSecret {
                path: path.display().to_string(),
                field: "password",
                env: PASSWORD_ENV,
            })?;
            TdsAuth::SqlServer { username, password }
        }
        RawAuth::AzureAdToken { token } => {
            let token = from_env(TOKEN_ENV).or(token).ok_or_else(|| ConfigError::MissingSecret {
                path: path.display().to_string(),
                field: "token",
                env: TOKEN_ENV,
            })?;
            TdsAuth::AadToken(token)
        }
    };

    Ok(TdsConfig {
        host: raw.host,
        port: raw.port,
        database: raw.database,
        auth,
        trust_cert: raw.trust_cert,
        statement_timeout: raw
            .statement_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    })
}

// ── Manifests ────────────────────────────────────────────────────────────────

/// Load resources from a manifest file, or from every `*.yml` / `*.yaml`
/// file directly inside a directory in file-name order.
pub fn load_manifests(path: &Path) -> Result<Vec<ResourceModel>, ConfigError> {
    let files = if path.is_dir() {
        manifest_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut resources = Vec::new();
    for file in files {
        debug!("Loading manifest {}", file.display());
        let content = read(&file)?;
        resources.extend(parse_manifest(&content, &file)?);
    }
    Ok(resources)
}

fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yml" | "yaml")
        );
        if path.is_file() && is_yaml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn parse_manifest(content: &str, path: &Path) -> Result<Vec<ResourceModel>, ConfigError> {
    let raw: RawManifest = serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;

    raw.resources
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let model: ResourceModel =
                serde_yaml::from_value(value).map_err(|e| ConfigError::Manifest {
                    path: path.display().to_string(),
                    index,
                    message: e.to_string(),
                })?;
            validate(&model).map_err(|source| ConfigError::InvalidName {
                path: path.display().to_string(),
                index,
                source,
            })?;
            Ok(model)
        })
        .collect()
}

/// Reject names the server would refuse before any statement is sent.
fn validate(model: &ResourceModel) -> Result<(), DomainError> {
    let name = match model {
        ResourceModel::Database(d) => &d.name,
        ResourceModel::Schema(d) => &d.name,
        ResourceModel::DatabaseRole(d) => &d.name,
        ResourceModel::SqlUser(d) => &d.name,
        ResourceModel::AzureadUser(d) => &d.name,
        ResourceModel::AzureadServicePrincipal(d) => &d.name,
        ResourceModel::ServerRole(d) => &d.name,
        ResourceModel::SqlLogin(d) => &d.name,
        ResourceModel::DatabaseRoleMember(_)
        | ResourceModel::ServerRoleMember(_)
        | ResourceModel::DatabasePermission(_)
        | ResourceModel::SchemaPermission(_) => return Ok(()),
    };
    validate_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn env_password_overrides_file() {
        let yaml = "host: db.example.com\nauth:\n  type: sql\n  username: sa\n  password: from-file\n";
        let env = |key: &str| (key == PASSWORD_ENV).then(|| "from-env".to_string());

        let config = parse_connection(yaml, Path::new("connection.yml"), env).unwrap();

        assert_eq!(config.port, 1433);
        match config.auth {
            TdsAuth::SqlServer { username, password } => {
                assert_eq!(username, "sa");
                assert_eq!(password, "from-env");
            }
            other => panic!("unexpected auth {other:?}"),
        }
    }

    #[test]
    fn missing_token_names_its_env_var() {
        let yaml = "host: db.example.com\nauth:\n  type: azure_ad_token\n";

        let err = parse_connection(yaml, Path::new("connection.yml"), no_env).unwrap_err();

        assert!(matches!(err, ConfigError::MissingSecret { field: "token", .. }), "{err}");
        assert!(err.to_string().contains(TOKEN_ENV));
    }

    #[test]
    fn blank_host_is_rejected() {
        let yaml = "host: ' '\nauth:\n  type: azure_ad_token\n  token: t\n";

        let err = parse_connection(yaml, Path::new("c.yml"), no_env).unwrap_err();

        assert_eq!(err.to_string(), "invalid connection settings in c.yml: host must not be empty");
    }

    #[test]
    fn zero_timeout_means_none() {
        let yaml = "host: h\nstatement_timeout_secs: 0\nauth:\n  type: azure_ad_token\n  token: t\n";

        let config = parse_connection(yaml, Path::new("c.yml"), no_env).unwrap();

        assert!(config.statement_timeout.is_none());
    }

    #[test]
    fn bad_entry_names_its_index() {
        let yaml = "resources:\n  - kind: server_role\n    name: ops\n  - kind: no_such_kind\n    name: x\n";

        let err = parse_manifest(yaml, Path::new("m.yml")).unwrap_err();

        assert!(matches!(err, ConfigError::Manifest { index: 1, .. }), "{err}");
        assert!(err.to_string().starts_with("m.yml: resources[1]: "), "{err}");
    }

    #[test]
    fn overlong_name_names_its_entry() {
        let yaml = format!("resources:\n  - kind: database\n    name: {}\n", "x".repeat(200));

        let err = parse_manifest(&yaml, Path::new("m.yml")).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidName { index: 0, .. }), "{err}");
    }
}
