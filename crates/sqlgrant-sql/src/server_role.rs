use async_trait::async_trait;
use sqlgrant_domain::{validate_name, ServerPrincipalId, ServerRoleId, ServerRoleSettings};
use tracing::debug;

use crate::connection::{scalar_i32, scalar_string, Connection};
use crate::entity::{Entity, Owned, Renameable};
use crate::error::SqlError;
use crate::quote::quote_ident;
use crate::values;

const KIND: &str = "server role";

/// Readable name of a `sys.server_principals.type` code.
fn server_principal_type(code: &str) -> &'static str {
    match code.trim() {
        "S" => "SQL login",
        "U" => "Windows login",
        "G" => "Windows group",
        "R" => "server role",
        "E" => "Azure AD login",
        "X" => "Azure AD group",
        "C" => "certificate login",
        "K" => "asymmetric key login",
        _ => "server principal",
    }
}

pub(crate) async fn server_principal_name(
    conn: &dyn Connection,
    id: ServerPrincipalId,
) -> Result<String, SqlError> {
    scalar_string(
        conn,
        "SELECT [name] FROM sys.server_principals WHERE [principal_id] = @p1",
        &values![id],
    )
    .await?
    .ok_or_else(|| SqlError::not_found("server principal", id))
}

#[derive(Clone, Copy)]
pub struct ServerRole<'c> {
    conn: &'c dyn Connection,
    id: ServerRoleId,
}

impl<'c> ServerRole<'c> {
    pub async fn get(conn: &'c dyn Connection, id: ServerRoleId) -> Result<ServerRole<'c>, SqlError> {
        let code = scalar_string(
            conn,
            "SELECT [type] FROM sys.server_principals WHERE [principal_id] = @p1",
            &values![id],
        )
        .await?
        .ok_or_else(|| SqlError::not_found(KIND, id))?;
        if code.trim() != "R" {
            return Err(SqlError::type_mismatch(id, KIND, server_principal_type(&code)));
        }
        Ok(ServerRole { conn, id })
    }

    pub async fn get_by_name(conn: &'c dyn Connection, name: &str) -> Result<ServerRole<'c>, SqlError> {
        let row = conn
            .query_row(
                "SELECT [principal_id], [type] FROM sys.server_principals WHERE [name] = @p1",
                &values![name],
            )
            .await?
            .ok_or_else(|| SqlError::not_found(KIND, name))?;
        let code = row.string(1)?;
        if code.trim() != "R" {
            return Err(SqlError::type_mismatch(name, KIND, server_principal_type(&code)));
        }
        Ok(ServerRole { conn, id: ServerRoleId(row.i32(0)?) })
    }

    /// An empty owner leaves ownership to the server, which assigns the
    /// creating login.
    pub async fn create(
        conn: &'c dyn Connection,
        settings: &ServerRoleSettings,
    ) -> Result<ServerRole<'c>, SqlError> {
        validate_name(&settings.name)?;
        let mut sql = format!("CREATE SERVER ROLE {}", quote_ident(&settings.name));
        if !settings.owner_id.is_empty() {
            let owner = server_principal_name(conn, settings.owner_id).await?;
            sql.push_str(&format!(" AUTHORIZATION {}", quote_ident(&owner)));
        }
        conn.exec(&sql, &[]).await?;
        debug!("Created server role {}", settings.name);
        Self::get_by_name(conn, &settings.name).await
    }

    pub async fn add_member(&self, member: ServerPrincipalId) -> Result<(), SqlError> {
        self.alter_membership("ADD", member).await
    }

    pub async fn remove_member(&self, member: ServerPrincipalId) -> Result<(), SqlError> {
        self.alter_membership("DROP", member).await
    }

    async fn alter_membership(&self, verb: &str, member: ServerPrincipalId) -> Result<(), SqlError> {
        let role = self.name().await?;
        let member_name = server_principal_name(self.conn, member).await?;
        self.conn
            .exec(
                &format!(
                    "ALTER SERVER ROLE {} {verb} MEMBER {}",
                    quote_ident(&role),
                    quote_ident(&member_name)
                ),
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn has_member(&self, member: ServerPrincipalId) -> Result<bool, SqlError> {
        let count = scalar_i32(
            self.conn,
            "SELECT COUNT(*) FROM sys.server_role_members WHERE [role_principal_id] = @p1 AND [member_principal_id] = @p2",
            &values![self.id, member],
        )
        .await?;
        Ok(count.unwrap_or(0) > 0)
    }

    pub async fn members(&self) -> Result<Vec<ServerPrincipalId>, SqlError> {
        let rows = self
            .conn
            .query(
                "SELECT [member_principal_id] FROM sys.server_role_members WHERE [role_principal_id] = @p1",
                &values![self.id],
            )
            .await?;
        rows.iter().map(|r| r.i32(0).map(ServerPrincipalId)).collect()
    }
}

#[async_trait]
impl<'c> Entity for ServerRole<'c> {
    type Id = ServerRoleId;
    type Settings = ServerRoleSettings;

    fn id(&self) -> ServerRoleId {
        self.id
    }

    async fn name(&self) -> Result<String, SqlError> {
        match server_principal_name(self.conn, self.id.into()).await {
            Err(SqlError::NotFound { .. }) => Err(SqlError::not_found(KIND, self.id)),
            other => other,
        }
    }

    async fn settings(&self) -> Result<ServerRoleSettings, SqlError> {
        let row = self
            .conn
            .query_row(
                "SELECT [name], [owning_principal_id] FROM sys.server_principals WHERE [principal_id] = @p1 AND [type] = 'R'",
                &values![self.id],
            )
            .await?
            .ok_or_else(|| SqlError::not_found(KIND, self.id))?;
        Ok(ServerRoleSettings {
            name: row.string(0)?,
            owner_id: ServerPrincipalId(row.i32(1)?),
        })
    }

    async fn drop(&self) -> Result<(), SqlError> {
        let name = self.name().await?;
        self.conn
            .exec(&format!("DROP SERVER ROLE {}", quote_ident(&name)), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<'c> Renameable for ServerRole<'c> {
    async fn rename(&self, new_name: &str) -> Result<(), SqlError> {
        validate_name(new_name)?;
        let current = self.name().await?;
        self.conn
            .exec(
                &format!(
                    "ALTER SERVER ROLE {} WITH NAME = {}",
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
impl<'c> Owned for ServerRole<'c> {
    type OwnerId = ServerPrincipalId;

    async fn owner_id(&self) -> Result<ServerPrincipalId, SqlError> {
        Ok(self.settings().await?.owner_id)
    }

    /// The empty owner hands the role to the connected login.
    async fn change_owner(&self, owner: ServerPrincipalId) -> Result<(), SqlError> {
        let name = self.name().await?;
        let owner_name = if owner.is_empty() {
            scalar_string(self.conn, "SELECT SUSER_NAME()", &[])
                .await?
                .ok_or_else(|| SqlError::Decode("SUSER_NAME() returned NULL".into()))?
        } else {
            server_principal_name(self.conn, owner).await?
        };
        self.conn
            .exec(
                &format!(
                    "ALTER AUTHORIZATION ON SERVER ROLE::{} TO {}",
                    quote_ident(&name),
                    quote_ident(&owner_name)
                ),
                &[],
            )
            .await?;
        Ok(())
    }
}
