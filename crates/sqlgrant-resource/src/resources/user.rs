//! Database users: SQL users mapped to logins and Azure AD principals.

use async_trait::async_trait;
use sqlgrant_domain::{
    AadObjectId, AzureAdServicePrincipalData, AzureAdUserData, ClientId, DatabaseId,
    DatabaseScoped, SqlUserData, UserId, UserSettings, UserType,
};
use sqlgrant_sql::{Connection, Entity, Renameable, SqlError, User};
use tracing::info;

use crate::error::ResourceError;
use crate::resource::{confirm, database_conn, parse_id, Resource, Response};

/// Observed settings of the user behind a stored id.
async fn read_user(
    conn: &dyn Connection,
    id: Option<&str>,
    kind: &'static str,
) -> Result<(DatabaseScoped<UserId>, UserSettings), ResourceError> {
    let id: DatabaseScoped<UserId> = parse_id(id, kind)?;
    let db = database_conn(conn, id.database_id).await?;
    let settings = User::get(db.as_ref(), id.object_id).await?.settings().await?;
    Ok((id, settings))
}

async fn create_user(
    conn: &dyn Connection,
    database_id: DatabaseId,
    settings: &UserSettings,
) -> Result<(String, UserSettings), ResourceError> {
    let db = database_conn(conn, database_id).await?;
    let user = User::create(db.as_ref(), settings).await?;
    info!("Created {} {} in database {}", settings.user_type, settings.name, database_id);
    let observed = user.settings().await?;
    Ok((DatabaseScoped::new(database_id, user.id()).to_string(), observed))
}

async fn rename_user(
    conn: &dyn Connection,
    id: Option<&str>,
    kind: &'static str,
    name: &str,
) -> Result<UserSettings, ResourceError> {
    let id: DatabaseScoped<UserId> = parse_id(id, kind)?;
    let db = database_conn(conn, id.database_id).await?;
    let user = User::get(db.as_ref(), id.object_id).await?;
    user.rename(name).await?;
    Ok(user.settings().await?)
}

async fn drop_user(conn: &dyn Connection, id: Option<&str>, kind: &'static str) -> Result<(), ResourceError> {
    let id: DatabaseScoped<UserId> = parse_id(id, kind)?;
    let db = database_conn(conn, id.database_id).await?;
    User::get(db.as_ref(), id.object_id).await?.drop().await?;
    info!("Dropped {kind} {id}");
    Ok(())
}

fn expect_type(settings: &UserSettings, accept: &[UserType], kind: &'static str) -> Result<(), ResourceError> {
    if accept.contains(&settings.user_type) {
        Ok(())
    } else {
        Err(SqlError::type_mismatch(&settings.name, kind, settings.user_type).into())
    }
}

// ── SQL user ─────────────────────────────────────────────────────────────────

pub struct SqlUserResource;

impl SqlUserResource {
    fn with_settings(data: &SqlUserData, settings: UserSettings) -> Result<SqlUserData, ResourceError> {
        expect_type(&settings, &[UserType::Sql], Self::KIND)?;
        Ok(SqlUserData {
            name: settings.name,
            login_id: settings.login_id.unwrap_or_else(|| data.login_id.clone()),
            ..data.clone()
        })
    }
}

#[async_trait]
impl Resource for SqlUserResource {
    type Data = SqlUserData;

    const KIND: &'static str = "sql_user";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["database_id", "login_id"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &SqlUserData,
        resp: &mut Response<SqlUserData>,
    ) -> Result<(), ResourceError> {
        let (id, settings) = read_user(conn, state.id.as_deref(), Self::KIND).await?;
        let data = SqlUserData { database_id: id.database_id, ..state.clone() };
        resp.set_state(Self::with_settings(&data, settings)?);
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &SqlUserData,
        resp: &mut Response<SqlUserData>,
    ) -> Result<(), ResourceError> {
        let settings = UserSettings {
            name: plan.name.clone(),
            user_type: UserType::Sql,
            login_id: Some(plan.login_id.clone()),
            aad_object_id: None,
        };
        let (id, observed) = create_user(conn, plan.database_id, &settings).await?;
        let mut state = Self::with_settings(plan, observed)?;
        state.id = Some(id);
        resp.set_state(state);
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &SqlUserData,
        resp: &mut Response<SqlUserData>,
    ) -> Result<(), ResourceError> {
        let observed = rename_user(conn, plan.id.as_deref(), Self::KIND, &plan.name).await?;
        let state = Self::with_settings(plan, observed)?;
        resp.set_state(state.clone());
        confirm(Self::KIND, "name", &plan.name, &state.name)
    }

    async fn delete(&self, conn: &dyn Connection, state: &SqlUserData) -> Result<(), ResourceError> {
        drop_user(conn, state.id.as_deref(), Self::KIND).await
    }
}

// ── Azure AD user ────────────────────────────────────────────────────────────

pub struct AzureAdUserResource;

impl AzureAdUserResource {
    fn with_settings(data: &AzureAdUserData, settings: UserSettings) -> Result<AzureAdUserData, ResourceError> {
        expect_type(&settings, &[UserType::AzureAd, UserType::AzureAdGroup], Self::KIND)?;
        Ok(AzureAdUserData {
            name: settings.name,
            user_object_id: settings.aad_object_id.unwrap_or(data.user_object_id),
            ..data.clone()
        })
    }
}

#[async_trait]
impl Resource for AzureAdUserResource {
    type Data = AzureAdUserData;

    const KIND: &'static str = "azuread_user";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["database_id", "user_object_id"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &AzureAdUserData,
        resp: &mut Response<AzureAdUserData>,
    ) -> Result<(), ResourceError> {
        let (id, settings) = read_user(conn, state.id.as_deref(), Self::KIND).await?;
        let data = AzureAdUserData { database_id: id.database_id, ..state.clone() };
        resp.set_state(Self::with_settings(&data, settings)?);
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &AzureAdUserData,
        resp: &mut Response<AzureAdUserData>,
    ) -> Result<(), ResourceError> {
        let settings = UserSettings {
            name: plan.name.clone(),
            user_type: UserType::AzureAd,
            login_id: None,
            aad_object_id: Some(plan.user_object_id),
        };
        let (id, observed) = create_user(conn, plan.database_id, &settings).await?;
        let mut state = Self::with_settings(plan, observed)?;
        state.id = Some(id);
        resp.set_state(state);
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &AzureAdUserData,
        resp: &mut Response<AzureAdUserData>,
    ) -> Result<(), ResourceError> {
        let observed = rename_user(conn, plan.id.as_deref(), Self::KIND, &plan.name).await?;
        let state = Self::with_settings(plan, observed)?;
        resp.set_state(state.clone());
        confirm(Self::KIND, "name", &plan.name, &state.name)
    }

    async fn delete(&self, conn: &dyn Connection, state: &AzureAdUserData) -> Result<(), ResourceError> {
        drop_user(conn, state.id.as_deref(), Self::KIND).await
    }
}

// ── Azure AD service principal ───────────────────────────────────────────────

pub struct AzureAdServicePrincipalResource;

impl AzureAdServicePrincipalResource {
    fn with_settings(
        data: &AzureAdServicePrincipalData,
        settings: UserSettings,
    ) -> Result<AzureAdServicePrincipalData, ResourceError> {
        expect_type(&settings, &[UserType::AzureAd], Self::KIND)?;
        Ok(AzureAdServicePrincipalData {
            name: settings.name,
            client_id: settings
                .aad_object_id
                .map(|id| ClientId::new(*id.as_uuid()))
                .unwrap_or(data.client_id),
            ..data.clone()
        })
    }
}

#[async_trait]
impl Resource for AzureAdServicePrincipalResource {
    type Data = AzureAdServicePrincipalData;

    const KIND: &'static str = "azuread_service_principal";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["database_id", "client_id"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &AzureAdServicePrincipalData,
        resp: &mut Response<AzureAdServicePrincipalData>,
    ) -> Result<(), ResourceError> {
        let (id, settings) = read_user(conn, state.id.as_deref(), Self::KIND).await?;
        let data = AzureAdServicePrincipalData { database_id: id.database_id, ..state.clone() };
        resp.set_state(Self::with_settings(&data, settings)?);
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &AzureAdServicePrincipalData,
        resp: &mut Response<AzureAdServicePrincipalData>,
    ) -> Result<(), ResourceError> {
        // The SID of a service principal derives from its client id.
        let settings = UserSettings {
            name: plan.name.clone(),
            user_type: UserType::AzureAd,
            login_id: None,
            aad_object_id: Some(AadObjectId::new(*plan.client_id.as_uuid())),
        };
        let (id, observed) = create_user(conn, plan.database_id, &settings).await?;
        let mut state = Self::with_settings(plan, observed)?;
        state.id = Some(id);
        resp.set_state(state);
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &AzureAdServicePrincipalData,
        resp: &mut Response<AzureAdServicePrincipalData>,
    ) -> Result<(), ResourceError> {
        let observed = rename_user(conn, plan.id.as_deref(), Self::KIND, &plan.name).await?;
        let state = Self::with_settings(plan, observed)?;
        resp.set_state(state.clone());
        confirm(Self::KIND, "name", &plan.name, &state.name)
    }

    async fn delete(&self, conn: &dyn Connection, state: &AzureAdServicePrincipalData) -> Result<(), ResourceError> {
        drop_user(conn, state.id.as_deref(), Self::KIND).await
    }
}
