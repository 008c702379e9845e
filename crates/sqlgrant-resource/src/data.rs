//! Read-only lookups of existing objects by name or external key.

use sqlgrant_domain::{
    AadObjectId, AzureAdServicePrincipalData, AzureAdUserData, ClientId, DatabaseData, DatabaseId,
    DatabasePrincipalId, DatabaseRoleData, DatabaseScoped, ResourceModel, SchemaData, SqlLoginData,
};
use sqlgrant_sql::{
    find_aad_principal, AadKey, AadPrincipalKind, Connection, Database, DatabaseRole, Entity, Schema,
    SqlError, SqlLogin,
};

use crate::error::ResourceError;
use crate::resource::{database_conn, refresh};
use crate::resources::{DatabaseResource, DatabaseRoleResource, SchemaResource, SqlLoginResource};

/// What to look up. Azure AD principals take exactly one of a name or a GUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Database {
        name: String,
    },
    Schema {
        database_id: DatabaseId,
        name: String,
    },
    DatabaseRole {
        database_id: DatabaseId,
        name: String,
    },
    SqlLogin {
        name: String,
    },
    AzureadUser {
        database_id: DatabaseId,
        name: Option<String>,
        user_object_id: Option<AadObjectId>,
    },
    AzureadServicePrincipal {
        database_id: DatabaseId,
        name: Option<String>,
        client_id: Option<ClientId>,
    },
}

impl Lookup {
    pub fn kind(&self) -> &'static str {
        match self {
            Lookup::Database { .. } => "database",
            Lookup::Schema { .. } => "schema",
            Lookup::DatabaseRole { .. } => "database_role",
            Lookup::SqlLogin { .. } => "sql_login",
            Lookup::AzureadUser { .. } => "azuread_user",
            Lookup::AzureadServicePrincipal { .. } => "azuread_service_principal",
        }
    }
}

/// The single key an Azure AD lookup was given.
fn aad_key<'a>(
    kind: &'static str,
    guid_field: &'static str,
    name: Option<&'a str>,
    guid: Option<AadKey<'a>>,
) -> Result<AadKey<'a>, ResourceError> {
    match (name, guid) {
        (Some(name), None) => Ok(AadKey::Name(name)),
        (None, Some(guid)) => Ok(guid),
        _ => Err(ResourceError::Configuration(format!(
            "{kind} lookup needs exactly one of name or {guid_field}"
        ))),
    }
}

pub async fn lookup(conn: &dyn Connection, query: &Lookup) -> Result<ResourceModel, ResourceError> {
    match query {
        Lookup::Database { name } => {
            let db = Database::get_by_name(conn, name).await?;
            let seed = DatabaseData { id: Some(db.id().to_string()), name: name.clone(), collation: None };
            Ok(ResourceModel::Database(refresh(&DatabaseResource, conn, &seed).await?))
        }
        Lookup::Schema { database_id, name } => {
            let db = database_conn(conn, *database_id).await?;
            let schema = Schema::get_by_name(db.as_ref(), name).await?;
            let seed = SchemaData {
                id: Some(DatabaseScoped::new(*database_id, schema.id()).to_string()),
                database_id: *database_id,
                name: name.clone(),
                owner_id: None,
            };
            Ok(ResourceModel::Schema(refresh(&SchemaResource, conn, &seed).await?))
        }
        Lookup::DatabaseRole { database_id, name } => {
            let db = database_conn(conn, *database_id).await?;
            let role = DatabaseRole::get_by_name(db.as_ref(), name).await?;
            let seed = DatabaseRoleData {
                id: Some(DatabaseScoped::new(*database_id, role.id()).to_string()),
                database_id: *database_id,
                name: name.clone(),
                owner_id: None,
            };
            Ok(ResourceModel::DatabaseRole(refresh(&DatabaseRoleResource, conn, &seed).await?))
        }
        Lookup::SqlLogin { name } => {
            let login = SqlLogin::get_by_name(conn, name).await?;
            let seed = SqlLoginData {
                id: Some(login.id().to_string()),
                name: name.clone(),
                password: None,
                must_change_password: false,
                default_database_id: DatabaseId::MASTER,
                default_language: None,
                check_password_expiration: true,
                check_password_policy: true,
                principal_id: None,
            };
            Ok(ResourceModel::SqlLogin(refresh(&SqlLoginResource, conn, &seed).await?))
        }
        Lookup::AzureadUser { database_id, name, user_object_id } => {
            let key = aad_key(
                query.kind(),
                "user_object_id",
                name.as_deref(),
                user_object_id.map(|id| AadKey::Guid(*id.as_uuid())),
            )?;
            let (id, name, object_id) = find_external(conn, *database_id, AadPrincipalKind::User, key).await?;
            Ok(ResourceModel::AzureadUser(AzureAdUserData {
                id: Some(id),
                database_id: *database_id,
                name,
                user_object_id: object_id,
            }))
        }
        Lookup::AzureadServicePrincipal { database_id, name, client_id } => {
            let key = aad_key(
                query.kind(),
                "client_id",
                name.as_deref(),
                client_id.map(|id| AadKey::Guid(*id.as_uuid())),
            )?;
            let (id, name, object_id) =
                find_external(conn, *database_id, AadPrincipalKind::ServicePrincipal, key).await?;
            Ok(ResourceModel::AzureadServicePrincipal(AzureAdServicePrincipalData {
                id: Some(id),
                database_id: *database_id,
                name,
                client_id: ClientId::new(*object_id.as_uuid()),
            }))
        }
    }
}

/// Composite id, current name and SID-derived GUID of an external user.
async fn find_external(
    conn: &dyn Connection,
    database_id: DatabaseId,
    kind: AadPrincipalKind,
    key: AadKey<'_>,
) -> Result<(String, String, AadObjectId), ResourceError> {
    let db = database_conn(conn, database_id).await?;
    let user = find_aad_principal(db.as_ref(), kind, key).await?;
    let settings = user.settings().await?;
    let object_id = settings
        .aad_object_id
        .ok_or_else(|| SqlError::Decode(format!("external user {} has no GUID SID", settings.name)))?;
    let id = DatabaseScoped::new(database_id, DatabasePrincipalId(user.id().0)).to_string();
    Ok((id, settings.name, object_id))
}
