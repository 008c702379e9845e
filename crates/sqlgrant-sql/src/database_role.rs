use async_trait::async_trait;
use sqlgrant_domain::{
    validate_name, DatabasePrincipalId, DatabaseRoleId, DatabaseRoleSettings, PrincipalType,
};
use tracing::debug;

use crate::connection::{scalar_i32, Connection};
use crate::entity::{Entity, Owned, Renameable};
use crate::error::SqlError;
use crate::principal::{expect_principal, principal_by_name, principal_name};
use crate::quote::quote_ident;
use crate::values;

const KIND: &str = "database role";

#[derive(Clone, Copy)]
pub struct DatabaseRole<'c> {
    conn: &'c dyn Connection,
    id: DatabaseRoleId,
}

impl<'c> DatabaseRole<'c> {
    pub async fn get(conn: &'c dyn Connection, id: DatabaseRoleId) -> Result<DatabaseRole<'c>, SqlError> {
        expect_principal(conn, KIND, id.into(), |t| t == PrincipalType::DatabaseRole).await?;
        Ok(DatabaseRole { conn, id })
    }

    pub async fn get_by_name(conn: &'c dyn Connection, name: &str) -> Result<DatabaseRole<'c>, SqlError> {
        match principal_by_name(conn, name).await? {
            None => Err(SqlError::not_found(KIND, name)),
            Some((id, PrincipalType::DatabaseRole)) => {
                Ok(DatabaseRole { conn, id: DatabaseRoleId(id.0) })
            }
            Some((_, other)) => Err(SqlError::type_mismatch(name, KIND, other)),
        }
    }

    pub async fn create(
        conn: &'c dyn Connection,
        settings: &DatabaseRoleSettings,
    ) -> Result<DatabaseRole<'c>, SqlError> {
        validate_name(&settings.name)?;
        let owner = conn.get_user_name(settings.owner_id).await?;
        conn.exec(
            &format!(
                "CREATE ROLE {} AUTHORIZATION {}",
                quote_ident(&settings.name),
                quote_ident(&owner)
            ),
            &[],
        )
        .await?;
        debug!("Created database role {}", settings.name);
        Self::get_by_name(conn, &settings.name).await
    }

    pub async fn add_member(&self, member: DatabasePrincipalId) -> Result<(), SqlError> {
        self.alter_membership("ADD", member).await
    }

    pub async fn remove_member(&self, member: DatabasePrincipalId) -> Result<(), SqlError> {
        self.alter_membership("DROP", member).await
    }

    async fn alter_membership(&self, verb: &str, member: DatabasePrincipalId) -> Result<(), SqlError> {
        let role = self.name().await?;
        let member_name = principal_name(self.conn, "database principal", member).await?;
        self.conn
            .exec(
                &format!(
                    "ALTER ROLE {} {verb} MEMBER {}",
                    quote_ident(&role),
                    quote_ident(&member_name)
                ),
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn has_member(&self, member: DatabasePrincipalId) -> Result<bool, SqlError> {
        let count = scalar_i32(
            self.conn,
            "SELECT COUNT(*) FROM sys.database_role_members WHERE [role_principal_id] = @p1 AND [member_principal_id] = @p2",
            &values![self.id, member],
        )
        .await?;
        Ok(count.unwrap_or(0) > 0)
    }

    pub async fn members(&self) -> Result<Vec<DatabasePrincipalId>, SqlError> {
        let rows = self
            .conn
            .query(
                "SELECT [member_principal_id] FROM sys.database_role_members WHERE [role_principal_id] = @p1",
                &values![self.id],
            )
            .await?;
        rows.iter()
            .map(|r| r.i32(0).map(DatabasePrincipalId))
            .collect()
    }
}

#[async_trait]
impl<'c> Entity for DatabaseRole<'c> {
    type Id = DatabaseRoleId;
    type Settings = DatabaseRoleSettings;

    fn id(&self) -> DatabaseRoleId {
        self.id
    }

    async fn name(&self) -> Result<String, SqlError> {
        principal_name(self.conn, KIND, self.id.into()).await
    }

    async fn settings(&self) -> Result<DatabaseRoleSettings, SqlError> {
        let row = self
            .conn
            .query_row(
                "SELECT [name], [owning_principal_id] FROM sys.database_principals WHERE [principal_id] = @p1 AND [type] = 'R'",
                &values![self.id],
            )
            .await?
            .ok_or_else(|| SqlError::not_found(KIND, self.id))?;
        Ok(DatabaseRoleSettings {
            name: row.string(0)?,
            owner_id: DatabasePrincipalId(row.i32(1)?),
        })
    }

    async fn drop(&self) -> Result<(), SqlError> {
        let name = self.name().await?;
        self.conn
            .exec(&format!("DROP ROLE {}", quote_ident(&name)), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<'c> Renameable for DatabaseRole<'c> {
    async fn rename(&self, new_name: &str) -> Result<(), SqlError> {
        validate_name(new_name)?;
        let current = self.name().await?;
        self.conn
            .exec(
                &format!(
                    "ALTER ROLE {} WITH NAME = {}",
                    quote_ident(&current),
                    quote_ident(new_name)
                ),
                &[],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<'c> Owned for DatabaseRole<'c> {
    type OwnerId = DatabasePrincipalId;

    async fn owner_id(&self) -> Result<DatabasePrincipalId, SqlError> {
        Ok(self.settings().await?.owner_id)
    }

    async fn change_owner(&self, owner: DatabasePrincipalId) -> Result<(), SqlError> {
        let name = self.name().await?;
        let owner_name = self.conn.get_user_name(owner).await?;
        self.conn
            .exec(
                &format!(
                    "ALTER AUTHORIZATION ON ROLE::{} TO {}",
                    quote_ident(&name),
                    quote_ident(&owner_name)
                ),
                &[],
            )
            .await?;
        Ok(())
    }
}
