//! Database-level and schema-level permission grants.

use async_trait::async_trait;
use sqlgrant_domain::{
    DatabasePermissionData, DatabasePermissionId, DatabasePrincipalId, DatabaseScoped, Permission,
    PermissionName, SchemaId, SchemaPermissionData, SchemaPermissionId,
};
use sqlgrant_sql::{Connection, DatabasePermissions, SchemaPermissions};
use tracing::info;

use crate::error::ResourceError;
use crate::resource::{confirm, database_conn, parse_id, Resource, Response};

fn permission_of(name: &PermissionName, with_grant_option: bool) -> Permission {
    Permission { name: name.clone(), with_grant_option }
}

// ── Database permission ──────────────────────────────────────────────────────

pub struct DatabasePermissionResource;

#[async_trait]
impl Resource for DatabasePermissionResource {
    type Data = DatabasePermissionData;

    const KIND: &'static str = "database_permission";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["principal_id", "permission"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &DatabasePermissionData,
        resp: &mut Response<DatabasePermissionData>,
    ) -> Result<(), ResourceError> {
        let id: DatabasePermissionId = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let perms = DatabasePermissions::get(db.as_ref(), id.principal_id).await?;
        let found = perms.permission(&id.permission).await?;
        resp.set_state(DatabasePermissionData {
            id: Some(id.to_string()),
            principal_id: DatabaseScoped::new(id.database_id, id.principal_id).to_string(),
            permission: found.name,
            with_grant_option: found.with_grant_option,
        });
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &DatabasePermissionData,
        resp: &mut Response<DatabasePermissionData>,
    ) -> Result<(), ResourceError> {
        let principal: DatabaseScoped<DatabasePrincipalId> = plan.principal_id.parse()?;
        let db = database_conn(conn, principal.database_id).await?;
        let perms = DatabasePermissions::get(db.as_ref(), principal.object_id).await?;
        perms
            .grant(&permission_of(&plan.permission, plan.with_grant_option))
            .await?;
        info!("Granted {} to {}", plan.permission, plan.principal_id);
        let id = DatabasePermissionId {
            database_id: principal.database_id,
            principal_id: principal.object_id,
            permission: plan.permission.clone(),
        };
        let found = perms.permission(&plan.permission).await?;
        resp.set_state(DatabasePermissionData {
            id: Some(id.to_string()),
            with_grant_option: found.with_grant_option,
            ..plan.clone()
        });
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &DatabasePermissionData,
        resp: &mut Response<DatabasePermissionData>,
    ) -> Result<(), ResourceError> {
        let id: DatabasePermissionId = parse_id(plan.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let perms = DatabasePermissions::get(db.as_ref(), id.principal_id).await?;
        let current = perms.permission(&id.permission).await?;
        if current.with_grant_option != plan.with_grant_option {
            perms.set_grant_option(&id.permission, plan.with_grant_option).await?;
        }
        let found = perms.permission(&id.permission).await?;
        resp.set_state(DatabasePermissionData { with_grant_option: found.with_grant_option, ..plan.clone() });
        confirm(Self::KIND, "with_grant_option", &plan.with_grant_option, &found.with_grant_option)
    }

    async fn delete(&self, conn: &dyn Connection, state: &DatabasePermissionData) -> Result<(), ResourceError> {
        let id: DatabasePermissionId = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        DatabasePermissions::get(db.as_ref(), id.principal_id)
            .await?
            .revoke(&id.permission)
            .await?;
        info!("Revoked database permission {id}");
        Ok(())
    }
}

// ── Schema permission ────────────────────────────────────────────────────────

pub struct SchemaPermissionResource;

impl SchemaPermissionResource {
    fn target(data: &SchemaPermissionData) -> Result<SchemaPermissionId, ResourceError> {
        let schema: DatabaseScoped<SchemaId> = data.schema_id.parse()?;
        let principal: DatabaseScoped<DatabasePrincipalId> = data.principal_id.parse()?;
        if schema.database_id != principal.database_id {
            return Err(ResourceError::Configuration(format!(
                "schema {} and principal {} belong to different databases",
                data.schema_id, data.principal_id
            )));
        }
        Ok(SchemaPermissionId {
            database_id: schema.database_id,
            schema_id: schema.object_id,
            principal_id: principal.object_id,
            permission: data.permission.clone(),
        })
    }

    fn state_for(id: &SchemaPermissionId, permission: Permission) -> SchemaPermissionData {
        SchemaPermissionData {
            id: Some(id.to_string()),
            schema_id: DatabaseScoped::new(id.database_id, id.schema_id).to_string(),
            principal_id: DatabaseScoped::new(id.database_id, id.principal_id).to_string(),
            permission: permission.name,
            with_grant_option: permission.with_grant_option,
        }
    }
}

#[async_trait]
impl Resource for SchemaPermissionResource {
    type Data = SchemaPermissionData;

    const KIND: &'static str = "schema_permission";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["schema_id", "principal_id", "permission"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &SchemaPermissionData,
        resp: &mut Response<SchemaPermissionData>,
    ) -> Result<(), ResourceError> {
        let id: SchemaPermissionId = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let perms = SchemaPermissions::get(db.as_ref(), id.schema_id, id.principal_id).await?;
        let found = perms.permission(&id.permission).await?;
        resp.set_state(Self::state_for(&id, found));
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &SchemaPermissionData,
        resp: &mut Response<SchemaPermissionData>,
    ) -> Result<(), ResourceError> {
        let id = Self::target(plan)?;
        let db = database_conn(conn, id.database_id).await?;
        let perms = SchemaPermissions::get(db.as_ref(), id.schema_id, id.principal_id).await?;
        perms
            .grant(&permission_of(&plan.permission, plan.with_grant_option))
            .await?;
        info!("Granted {} on schema {} to {}", plan.permission, plan.schema_id, plan.principal_id);
        let found = perms.permission(&id.permission).await?;
        resp.set_state(Self::state_for(&id, found));
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &SchemaPermissionData,
        resp: &mut Response<SchemaPermissionData>,
    ) -> Result<(), ResourceError> {
        let id: SchemaPermissionId = parse_id(plan.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let perms = SchemaPermissions::get(db.as_ref(), id.schema_id, id.principal_id).await?;
        let current = perms.permission(&id.permission).await?;
        if current.with_grant_option != plan.with_grant_option {
            perms.set_grant_option(&id.permission, plan.with_grant_option).await?;
        }
        let found = perms.permission(&id.permission).await?;
        let with_grant_option = found.with_grant_option;
        resp.set_state(Self::state_for(&id, found));
        confirm(Self::KIND, "with_grant_option", &plan.with_grant_option, &with_grant_option)
    }

    async fn delete(&self, conn: &dyn Connection, state: &SchemaPermissionData) -> Result<(), ResourceError> {
        let id: SchemaPermissionId = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        SchemaPermissions::get(db.as_ref(), id.schema_id, id.principal_id)
            .await?
            .revoke(&id.permission)
            .await?;
        info!("Revoked schema permission {id}");
        Ok(())
    }
}
