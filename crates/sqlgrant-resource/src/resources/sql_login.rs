use async_trait::async_trait;
use sqlgrant_domain::{LoginId, SqlLoginData, SqlLoginSettings};
use sqlgrant_sql::{Connection, Entity, Renameable, SqlLogin};
use tracing::info;

use crate::error::ResourceError;
use crate::resource::{confirm, parse_id, Resource, Response};

pub struct SqlLoginResource;

fn to_settings(data: &SqlLoginData) -> SqlLoginSettings {
    SqlLoginSettings {
        name: data.name.clone(),
        password: data.password.clone(),
        must_change_password: data.must_change_password,
        default_database_id: data.default_database_id,
        default_language: data.default_language.clone(),
        check_password_expiration: data.check_password_expiration,
        check_password_policy: data.check_password_policy,
    }
}

/// The password is never read back, so it is carried over from `data`.
async fn observed(login: &SqlLogin<'_>, data: &SqlLoginData) -> Result<SqlLoginData, ResourceError> {
    let settings = login.settings().await?;
    Ok(SqlLoginData {
        id: Some(login.id().to_string()),
        name: settings.name,
        password: data.password.clone(),
        must_change_password: settings.must_change_password,
        default_database_id: settings.default_database_id,
        default_language: settings.default_language,
        check_password_expiration: settings.check_password_expiration,
        check_password_policy: settings.check_password_policy,
        principal_id: Some(login.principal_id().await?),
    })
}

#[async_trait]
impl Resource for SqlLoginResource {
    type Data = SqlLoginData;

    const KIND: &'static str = "sql_login";

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &SqlLoginData,
        resp: &mut Response<SqlLoginData>,
    ) -> Result<(), ResourceError> {
        let id: LoginId = parse_id(state.id.as_deref(), Self::KIND)?;
        let login = SqlLogin::get(conn, id).await?;
        resp.set_state(observed(&login, state).await?);
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &SqlLoginData,
        resp: &mut Response<SqlLoginData>,
    ) -> Result<(), ResourceError> {
        let login = SqlLogin::create(conn, &to_settings(plan)).await?;
        info!("Created SQL login {} ({})", plan.name, login.id());
        resp.set_state(observed(&login, plan).await?);
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &SqlLoginData,
        resp: &mut Response<SqlLoginData>,
    ) -> Result<(), ResourceError> {
        let id: LoginId = parse_id(plan.id.as_deref(), Self::KIND)?;
        let login = SqlLogin::get(conn, id).await?;
        login.rename(&plan.name).await?;
        login.update_settings(&to_settings(plan)).await?;
        let state = observed(&login, plan).await?;
        resp.set_state(state.clone());
        confirm(Self::KIND, "name", &plan.name, &state.name)
    }

    async fn delete(&self, conn: &dyn Connection, state: &SqlLoginData) -> Result<(), ResourceError> {
        let id: LoginId = parse_id(state.id.as_deref(), Self::KIND)?;
        SqlLogin::get(conn, id.clone()).await?.drop().await?;
        info!("Dropped SQL login {id}");
        Ok(())
    }
}
