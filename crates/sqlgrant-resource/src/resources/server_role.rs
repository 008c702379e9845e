use async_trait::async_trait;
use sqlgrant_domain::{ServerPrincipalId, ServerRoleData, ServerRoleId, ServerRoleSettings};
use sqlgrant_sql::{Connection, Entity, Renameable, ServerRole};
use tracing::info;

use crate::error::ResourceError;
use crate::resource::{confirm, parse_id, Resource, Response};

pub struct ServerRoleResource;

fn with_settings(data: &ServerRoleData, settings: ServerRoleSettings) -> ServerRoleData {
    ServerRoleData { name: settings.name, owner_id: Some(settings.owner_id), ..data.clone() }
}

#[async_trait]
impl Resource for ServerRoleResource {
    type Data = ServerRoleData;

    const KIND: &'static str = "server_role";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["owner_id"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &ServerRoleData,
        resp: &mut Response<ServerRoleData>,
    ) -> Result<(), ResourceError> {
        let id: ServerRoleId = parse_id(state.id.as_deref(), Self::KIND)?;
        let role = ServerRole::get(conn, id).await?;
        resp.set_state(with_settings(state, role.settings().await?));
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &ServerRoleData,
        resp: &mut Response<ServerRoleData>,
    ) -> Result<(), ResourceError> {
        let settings = ServerRoleSettings {
            name: plan.name.clone(),
            owner_id: plan.owner_id.unwrap_or(ServerPrincipalId::EMPTY),
        };
        let role = ServerRole::create(conn, &settings).await?;
        info!("Created server role {} ({})", plan.name, role.id());
        let mut state = with_settings(plan, role.settings().await?);
        state.id = Some(role.id().to_string());
        resp.set_state(state);
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &ServerRoleData,
        resp: &mut Response<ServerRoleData>,
    ) -> Result<(), ResourceError> {
        let id: ServerRoleId = parse_id(plan.id.as_deref(), Self::KIND)?;
        let role = ServerRole::get(conn, id).await?;
        role.rename(&plan.name).await?;
        let state = with_settings(plan, role.settings().await?);
        resp.set_state(state.clone());
        confirm(Self::KIND, "name", &plan.name, &state.name)
    }

    async fn delete(&self, conn: &dyn Connection, state: &ServerRoleData) -> Result<(), ResourceError> {
        let id: ServerRoleId = parse_id(state.id.as_deref(), Self::KIND)?;
        ServerRole::get(conn, id).await?.drop().await?;
        info!("Dropped server role {id}");
        Ok(())
    }
}
