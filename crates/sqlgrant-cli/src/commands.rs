use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sqlgrant_resource::Lookup;
use sqlgrant_sql::{Cancellable, TdsConnection};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{LookupCommand, OutputFormat};
use crate::output;

// ── Connection ────────────────────────────────────────────────────────────────

/// Open the server connection. Ctrl-C aborts the statement in flight.
async fn connect(path: &Path) -> Result<Cancellable> {
    let config = sqlgrant_config::load_connection(path)
        .with_context(|| format!("Failed to load connection settings from {}", path.display()))?;
    info!("Connecting to {}:{}", config.host, config.port);
    let conn = TdsConnection::connect(config)
        .await
        .context("Failed to connect to SQL Server")?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    Ok(Cancellable::new(Arc::new(conn), token))
}

// ── Read / delete ─────────────────────────────────────────────────────────────

pub async fn read(connection: &Path, kind: &str, id: &str, format: OutputFormat) -> Result<()> {
    let seed = sqlgrant_resource::seed(kind, id)?;
    let conn = connect(connection).await?;
    let state = sqlgrant_resource::read(&conn, &seed)
        .await
        .with_context(|| format!("Failed to read {kind} {id}"))?;
    print!("{}", output::render_state(&state, format)?);
    Ok(())
}

pub async fn delete(connection: &Path, kind: &str, id: &str, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to drop {kind} {id} without --yes");
    }
    let seed = sqlgrant_resource::seed(kind, id)?;
    let conn = connect(connection).await?;
    sqlgrant_resource::delete(&conn, &seed)
        .await
        .with_context(|| format!("Failed to drop {kind} {id}"))?;
    println!("Dropped {kind} {id}");
    Ok(())
}

// ── Apply ─────────────────────────────────────────────────────────────────────

pub async fn apply(connection: &Path, manifest: &Path, format: OutputFormat) -> Result<()> {
    let plans = sqlgrant_config::load_manifests(manifest)
        .with_context(|| format!("Failed to load resources from {}", manifest.display()))?;
    if plans.is_empty() {
        println!("No resources in {}", manifest.display());
        return Ok(());
    }

    let conn = connect(connection).await?;
    info!("Applying {} resources", plans.len());
    let report = sqlgrant_resource::apply_all(&conn, &plans).await;

    match format {
        OutputFormat::Text => {
            print!("{}", output::render_changes(&report.changes));
            println!("{}", serde_json::to_string_pretty(&report.states)?);
            for error in &report.errors {
                eprintln!("error: {error}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !report.is_success() {
        bail!("{} of {} resources failed", report.errors.len(), plans.len());
    }
    Ok(())
}

// ── Lookup ────────────────────────────────────────────────────────────────────

pub async fn lookup(connection: &Path, target: LookupCommand, format: OutputFormat) -> Result<()> {
    let query = match target {
        LookupCommand::Database { name } => Lookup::Database { name },
        LookupCommand::Schema { database_id, name } => Lookup::Schema { database_id, name },
        LookupCommand::DatabaseRole { database_id, name } => Lookup::DatabaseRole { database_id, name },
        LookupCommand::SqlLogin { name } => Lookup::SqlLogin { name },
        LookupCommand::AzureadUser { database_id, name, object_id } => Lookup::AzureadUser {
            database_id,
            name,
            user_object_id: object_id,
        },
        LookupCommand::AzureadServicePrincipal { database_id, name, client_id } => {
            Lookup::AzureadServicePrincipal { database_id, name, client_id }
        }
    };

    let conn = connect(connection).await?;
    let found = sqlgrant_resource::lookup(&conn, &query)
        .await
        .with_context(|| format!("Failed to look up {}", query.kind()))?;
    print!("{}", output::render_state(&found, format)?);
    Ok(())
}

pub fn kinds() {
    for kind in sqlgrant_resource::KINDS {
        println!("{kind}");
    }
}
