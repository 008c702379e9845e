use std::sync::Arc;

use async_trait::async_trait;
use sqlgrant_domain::{validate_name, DatabaseId, DatabaseSettings};
use tracing::debug;

use crate::connection::{scalar_i32, scalar_string, Connection};
use crate::entity::{Entity, Renameable};
use crate::error::SqlError;
use crate::quote::{quote_ident, validate_collation};
use crate::values;

const KIND: &str = "database";

#[derive(Clone, Copy)]
pub struct Database<'c> {
    conn: &'c dyn Connection,
    id: DatabaseId,
}

impl<'c> Database<'c> {
    pub async fn get(conn: &'c dyn Connection, id: DatabaseId) -> Result<Database<'c>, SqlError> {
        let db = Database { conn, id };
        db.name().await?;
        Ok(db)
    }

    pub async fn get_by_name(conn: &'c dyn Connection, name: &str) -> Result<Database<'c>, SqlError> {
        let id = scalar_i32(conn, "SELECT DB_ID(@p1)", &values![name])
            .await?
            .ok_or_else(|| SqlError::not_found(KIND, name))?;
        Ok(Database { conn, id: DatabaseId(id) })
    }

    pub async fn create(
        conn: &'c dyn Connection,
        settings: &DatabaseSettings,
    ) -> Result<Database<'c>, SqlError> {
        validate_name(&settings.name)?;
        let mut sql = format!("CREATE DATABASE {}", quote_ident(&settings.name));
        if let Some(collation) = &settings.collation {
            validate_collation(collation)?;
            sql.push_str(&format!(" COLLATE {collation}"));
        }
        conn.exec(&sql, &[]).await?;
        debug!("Created database {}", settings.name);
        Self::get_by_name(conn, &settings.name).await
    }

    pub async fn set_collation(&self, collation: &str) -> Result<(), SqlError> {
        validate_collation(collation)?;
        let name = self.name().await?;
        self.conn
            .exec(
                &format!("ALTER DATABASE {} COLLATE {collation}", quote_ident(&name)),
                &[],
            )
            .await?;
        Ok(())
    }

    /// Open a connection scoped to this database.
    pub async fn connect(&self) -> Result<Arc<dyn Connection>, SqlError> {
        let name = self.name().await?;
        self.conn.for_database(&name).await
    }
}

#[async_trait]
impl<'c> Entity for Database<'c> {
    type Id = DatabaseId;
    type Settings = DatabaseSettings;

    fn id(&self) -> DatabaseId {
        self.id
    }

    async fn name(&self) -> Result<String, SqlError> {
        scalar_string(self.conn, "SELECT DB_NAME(@p1)", &values![self.id])
            .await?
            .ok_or_else(|| SqlError::not_found(KIND, self.id))
    }

    async fn settings(&self) -> Result<DatabaseSettings, SqlError> {
        let row = self
            .conn
            .query_row(
                "SELECT [name], [collation_name] FROM sys.databases WHERE [database_id] = @p1",
                &values![self.id],
            )
            .await?
            .ok_or_else(|| SqlError::not_found(KIND, self.id))?;
        Ok(DatabaseSettings {
            name: row.string(0)?,
            collation: row.opt_string(1)?,
        })
    }

    async fn drop(&self) -> Result<(), SqlError> {
        let name = self.name().await?;
        self.conn
            .exec(&format!("DROP DATABASE {}", quote_ident(&name)), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<'c> Renameable for Database<'c> {
    async fn rename(&self, new_name: &str) -> Result<(), SqlError> {
        validate_name(new_name)?;
        let current = self.name().await?;
        self.conn
            .exec(
                &format!(
                    "ALTER DATABASE {} MODIFY NAME = {}",
                    quote_ident(&current),
                    quote_ident(new_name)
                ),
                &[],
            )
            .await?;
        Ok(())
    }
}
