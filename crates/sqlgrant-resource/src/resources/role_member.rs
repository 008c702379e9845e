//! Role membership for database roles and server roles.

use async_trait::async_trait;
use sqlgrant_domain::{
    DatabasePrincipalId, DatabaseRoleId, DatabaseRoleMemberData, DatabaseScoped, RoleMemberId,
    ServerRoleMemberData, ServerRoleMemberId,
};
use sqlgrant_sql::{Connection, DatabaseRole, ServerRole, SqlError};
use tracing::info;

use crate::error::ResourceError;
use crate::resource::{database_conn, parse_id, Resource, Response};

pub struct DatabaseRoleMemberResource;

impl DatabaseRoleMemberResource {
    fn member_id(data: &DatabaseRoleMemberData) -> Result<RoleMemberId, ResourceError> {
        let role: DatabaseScoped<DatabaseRoleId> = data.role_id.parse()?;
        let member: DatabaseScoped<DatabasePrincipalId> = data.member_id.parse()?;
        if role.database_id != member.database_id {
            return Err(ResourceError::Configuration(format!(
                "role {} and member {} belong to different databases",
                data.role_id, data.member_id
            )));
        }
        Ok(RoleMemberId {
            database_id: role.database_id,
            role_id: role.object_id,
            member_id: member.object_id,
        })
    }

    fn state_for(data: &DatabaseRoleMemberData, id: RoleMemberId) -> DatabaseRoleMemberData {
        DatabaseRoleMemberData {
            id: Some(id.to_string()),
            role_id: DatabaseScoped::new(id.database_id, id.role_id).to_string(),
            member_id: DatabaseScoped::new(id.database_id, id.member_id).to_string(),
            ..data.clone()
        }
    }
}

#[async_trait]
impl Resource for DatabaseRoleMemberResource {
    type Data = DatabaseRoleMemberData;

    const KIND: &'static str = "database_role_member";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["role_id", "member_id"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &DatabaseRoleMemberData,
        resp: &mut Response<DatabaseRoleMemberData>,
    ) -> Result<(), ResourceError> {
        let id: RoleMemberId = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let role = DatabaseRole::get(db.as_ref(), id.role_id).await?;
        if !role.has_member(id.member_id).await? {
            return Err(SqlError::not_found("role membership", id).into());
        }
        resp.set_state(Self::state_for(state, id));
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &DatabaseRoleMemberData,
        resp: &mut Response<DatabaseRoleMemberData>,
    ) -> Result<(), ResourceError> {
        let id = Self::member_id(plan)?;
        let db = database_conn(conn, id.database_id).await?;
        DatabaseRole::get(db.as_ref(), id.role_id).await?.add_member(id.member_id).await?;
        info!("Added member {} to database role {}", plan.member_id, plan.role_id);
        resp.set_state(Self::state_for(plan, id));
        Ok(())
    }

    /// Every attribute forces replacement; update only refreshes.
    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &DatabaseRoleMemberData,
        resp: &mut Response<DatabaseRoleMemberData>,
    ) -> Result<(), ResourceError> {
        self.read(conn, plan, resp).await
    }

    async fn delete(&self, conn: &dyn Connection, state: &DatabaseRoleMemberData) -> Result<(), ResourceError> {
        let id: RoleMemberId = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        DatabaseRole::get(db.as_ref(), id.role_id).await?.remove_member(id.member_id).await?;
        info!("Removed database role membership {id}");
        Ok(())
    }
}

pub struct ServerRoleMemberResource;

#[async_trait]
impl Resource for ServerRoleMemberResource {
    type Data = ServerRoleMemberData;

    const KIND: &'static str = "server_role_member";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["role_id", "member_id"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &ServerRoleMemberData,
        resp: &mut Response<ServerRoleMemberData>,
    ) -> Result<(), ResourceError> {
        let id: ServerRoleMemberId = parse_id(state.id.as_deref(), Self::KIND)?;
        let role = ServerRole::get(conn, id.role_id).await?;
        if !role.has_member(id.member_id).await? {
            return Err(SqlError::not_found("server role membership", id).into());
        }
        resp.set_state(ServerRoleMemberData {
            id: Some(id.to_string()),
            role_id: id.role_id,
            member_id: id.member_id,
        });
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &ServerRoleMemberData,
        resp: &mut Response<ServerRoleMemberData>,
    ) -> Result<(), ResourceError> {
        ServerRole::get(conn, plan.role_id).await?.add_member(plan.member_id).await?;
        info!("Added member {} to server role {}", plan.member_id, plan.role_id);
        let id = ServerRoleMemberId { role_id: plan.role_id, member_id: plan.member_id };
        resp.set_state(ServerRoleMemberData { id: Some(id.to_string()), ..plan.clone() });
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &ServerRoleMemberData,
        resp: &mut Response<ServerRoleMemberData>,
    ) -> Result<(), ResourceError> {
        self.read(conn, plan, resp).await
    }

    async fn delete(&self, conn: &dyn Connection, state: &ServerRoleMemberData) -> Result<(), ResourceError> {
        let id: ServerRoleMemberId = parse_id(state.id.as_deref(), Self::KIND)?;
        ServerRole::get(conn, id.role_id).await?.remove_member(id.member_id).await?;
        info!("Removed server role membership {id}");
        Ok(())
    }
}
