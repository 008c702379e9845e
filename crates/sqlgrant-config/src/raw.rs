use serde::Deserialize;

/// Raw YAML representation of a connection file (connection.yml)
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConnection {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Absent means the login's default database.
    pub database: Option<String>,
    pub auth: RawAuth,
    #[serde(default)]
    pub trust_cert: bool,
    pub statement_timeout_secs: Option<u64>,
}

fn default_port() -> u16 {
    1433
}

/// Secrets may be left out here and supplied through the environment.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawAuth {
    Sql {
        username: String,
        password: Option<String>,
    },
    AzureAdToken {
        token: Option<String>,
    },
}

/// Raw YAML representation of a resource manifest. Entries stay untyped
/// until conversion so errors can name the offending index.
#[derive(Debug, Deserialize)]
pub struct RawManifest {
    #[serde(default)]
    pub resources: Vec<serde_yaml::Value>,
}
