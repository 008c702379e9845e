use async_trait::async_trait;
use sqlgrant_domain::{DatabaseData, DatabaseId, DatabaseSettings};
use sqlgrant_sql::{Connection, Database, Entity, Renameable};
use tracing::info;

use crate::error::ResourceError;
use crate::resource::{confirm, parse_id, Resource, Response};

pub struct DatabaseResource;

fn to_settings(data: &DatabaseData) -> DatabaseSettings {
    DatabaseSettings { name: data.name.clone(), collation: data.collation.clone() }
}

fn with_settings(data: &DatabaseData, settings: DatabaseSettings) -> DatabaseData {
    DatabaseData { name: settings.name, collation: settings.collation, ..data.clone() }
}

#[async_trait]
impl Resource for DatabaseResource {
    type Data = DatabaseData;

    const KIND: &'static str = "database";

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &DatabaseData,
        resp: &mut Response<DatabaseData>,
    ) -> Result<(), ResourceError> {
        let id: DatabaseId = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = Database::get(conn, id).await?;
        resp.set_state(with_settings(state, db.settings().await?));
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &DatabaseData,
        resp: &mut Response<DatabaseData>,
    ) -> Result<(), ResourceError> {
        let db = Database::create(conn, &to_settings(plan)).await?;
        info!("Created database {} ({})", plan.name, db.id());
        let mut state = with_settings(plan, db.settings().await?);
        state.id = Some(db.id().to_string());
        resp.set_state(state);
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &DatabaseData,
        resp: &mut Response<DatabaseData>,
    ) -> Result<(), ResourceError> {
        let id: DatabaseId = parse_id(plan.id.as_deref(), Self::KIND)?;
        let db = Database::get(conn, id).await?;
        let current = db.settings().await?;
        // SQL Server rejects MODIFY NAME to the name already in use.
        if current.name != plan.name {
            db.rename(&plan.name).await?;
        }
        if let Some(collation) = &plan.collation {
            if current.collation.as_ref() != Some(collation) {
                db.set_collation(collation).await?;
            }
        }
        let state = with_settings(plan, db.settings().await?);
        resp.set_state(state.clone());
        confirm(Self::KIND, "name", &plan.name, &state.name)?;
        if let Some(expected) = &plan.collation {
            let found = state.collation.clone().unwrap_or_default();
            confirm(Self::KIND, "collation", expected, &found)?;
        }
        Ok(())
    }

    async fn delete(&self, conn: &dyn Connection, state: &DatabaseData) -> Result<(), ResourceError> {
        let id: DatabaseId = parse_id(state.id.as_deref(), Self::KIND)?;
        Database::get(conn, id).await?.drop().await?;
        info!("Dropped database {}", id);
        Ok(())
    }
}
