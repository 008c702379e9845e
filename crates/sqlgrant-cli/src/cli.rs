use clap::{Parser, Subcommand, ValueEnum};
use sqlgrant_domain::{AadObjectId, ClientId, DatabaseId};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sqlgrant",
    about = "Declarative provisioning of SQL Server logins, users, roles and permissions",
    version
)]
pub struct Cli {
    /// Connection file (YAML).
    #[arg(long, short = 'c', env = "SQLGRANT_CONNECTION", default_value = "connection.yml", global = true)]
    pub connection: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the current server state of one resource.
    Read {
        /// Resource kind, e.g. `schema` or `sql_login`.
        kind: String,
        /// Stored resource id, e.g. `5/7` for a schema.
        id: String,
    },

    /// Create or update every resource in a manifest file or directory.
    Apply {
        manifest: PathBuf,
    },

    /// Drop one resource.
    Delete {
        kind: String,
        id: String,
        /// Required; dropping is not reversible.
        #[arg(long)]
        yes: bool,
    },

    /// Find an existing object by name or external key.
    Lookup {
        #[command(subcommand)]
        target: LookupCommand,
    },

    /// List the resource kinds a manifest may contain.
    Kinds,
}

#[derive(Debug, Subcommand)]
pub enum LookupCommand {
    Database {
        name: String,
    },
    Schema {
        #[arg(long, default_value = "1")]
        database_id: DatabaseId,
        name: String,
    },
    DatabaseRole {
        #[arg(long, default_value = "1")]
        database_id: DatabaseId,
        name: String,
    },
    SqlLogin {
        name: String,
    },
    /// Exactly one of `--name` or `--object-id`.
    AzureadUser {
        #[arg(long, default_value = "1")]
        database_id: DatabaseId,
        #[arg(long, conflicts_with = "object_id")]
        name: Option<String>,
        #[arg(long)]
        object_id: Option<AadObjectId>,
    },
    /// Exactly one of `--name` or `--client-id`.
    AzureadServicePrincipal {
        #[arg(long, default_value = "1")]
        database_id: DatabaseId,
        #[arg(long, conflicts_with = "client_id")]
        name: Option<String>,
        #[arg(long)]
        client_id: Option<ClientId>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
