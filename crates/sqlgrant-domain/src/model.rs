//! Declarative resource models.
//!
//! One struct per provisionable object type, carrying the attributes a user
//! declares plus the computed `id` that is filled in once the object exists
//! on the server. These are the values exchanged with callers; they never
//! hold a connection.

use serde::{Deserialize, Serialize};

use crate::ids::{
    AadObjectId, ClientId, DatabaseId, DatabasePrincipalId, LoginId, PermissionName,
    ServerPrincipalId, ServerRoleId,
};

fn default_database() -> DatabaseId {
    DatabaseId::MASTER
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseData {
    /// `<database_id>`.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub collation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaData {
    /// `<database_id>/<schema_id>`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_database")]
    pub database_id: DatabaseId,
    pub name: String,
    /// `None` means the connected user owns the schema.
    #[serde(default)]
    pub owner_id: Option<DatabasePrincipalId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRoleData {
    /// `<database_id>/<role_id>`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_database")]
    pub database_id: DatabaseId,
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<DatabasePrincipalId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRoleMemberData {
    /// `<database_id>/<role_id>/<member_id>`.
    #[serde(default)]
    pub id: Option<String>,
    /// `<database_id>/<role_id>`.
    pub role_id: String,
    /// `<database_id>/<principal_id>`; must live in the same database as the role.
    pub member_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlUserData {
    /// `<database_id>/<user_id>`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_database")]
    pub database_id: DatabaseId,
    pub name: String,
    pub login_id: LoginId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureAdUserData {
    /// `<database_id>/<user_id>`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_database")]
    pub database_id: DatabaseId,
    pub name: String,
    /// Object id of the user or group; rendered upper-case.
    pub user_object_id: AadObjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureAdServicePrincipalData {
    /// `<database_id>/<user_id>`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_database")]
    pub database_id: DatabaseId,
    pub name: String,
    /// Application (client) id; rendered upper-case.
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRoleData {
    /// `<role_id>`.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<ServerPrincipalId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRoleMemberData {
    /// `<role_id>/<member_id>`.
    #[serde(default)]
    pub id: Option<String>,
    pub role_id: ServerRoleId,
    pub member_id: ServerPrincipalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlLoginData {
    /// Login SID as `0x…` hex.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Write-only; carried over from prior state because the server never returns it.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub must_change_password: bool,
    #[serde(default = "default_database")]
    pub default_database_id: DatabaseId,
    #[serde(default)]
    pub default_language: Option<String>,
    #[serde(default = "default_true")]
    pub check_password_expiration: bool,
    #[serde(default = "default_true")]
    pub check_password_policy: bool,
    /// `sys.server_principals.principal_id`; computed.
    #[serde(default)]
    pub principal_id: Option<ServerPrincipalId>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabasePermissionData {
    /// `<database_id>/<principal_id>/<permission>`.
    #[serde(default)]
    pub id: Option<String>,
    /// `<database_id>/<principal_id>`.
    pub principal_id: String,
    pub permission: PermissionName,
    #[serde(default)]
    pub with_grant_option: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPermissionData {
    /// `<database_id>/<schema_id>/<principal_id>/<permission>`.
    #[serde(default)]
    pub id: Option<String>,
    /// `<database_id>/<schema_id>`.
    pub schema_id: String,
    /// `<database_id>/<principal_id>`.
    pub principal_id: String,
    pub permission: PermissionName,
    #[serde(default)]
    pub with_grant_option: bool,
}

/// The closed set of provisionable objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceModel {
    Database(DatabaseData),
    Schema(SchemaData),
    DatabaseRole(DatabaseRoleData),
    DatabaseRoleMember(DatabaseRoleMemberData),
    SqlUser(SqlUserData),
    AzureadUser(AzureAdUserData),
    AzureadServicePrincipal(AzureAdServicePrincipalData),
    ServerRole(ServerRoleData),
    ServerRoleMember(ServerRoleMemberData),
    SqlLogin(SqlLoginData),
    DatabasePermission(DatabasePermissionData),
    SchemaPermission(SchemaPermissionData),
}

impl ResourceModel {
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceModel::Database(_) => "database",
            ResourceModel::Schema(_) => "schema",
            ResourceModel::DatabaseRole(_) => "database_role",
            ResourceModel::DatabaseRoleMember(_) => "database_role_member",
            ResourceModel::SqlUser(_) => "sql_user",
            ResourceModel::AzureadUser(_) => "azuread_user",
            ResourceModel::AzureadServicePrincipal(_) => "azuread_service_principal",
            ResourceModel::ServerRole(_) => "server_role",
            ResourceModel::ServerRoleMember(_) => "server_role_member",
            ResourceModel::SqlLogin(_) => "sql_login",
            ResourceModel::DatabasePermission(_) => "database_permission",
            ResourceModel::SchemaPermission(_) => "schema_permission",
        }
    }

    pub fn id(&self) -> Option<&str> {
        let id = match self {
            ResourceModel::Database(d) => &d.id,
            ResourceModel::Schema(d) => &d.id,
            ResourceModel::DatabaseRole(d) => &d.id,
            ResourceModel::DatabaseRoleMember(d) => &d.id,
            ResourceModel::SqlUser(d) => &d.id,
            ResourceModel::AzureadUser(d) => &d.id,
            ResourceModel::AzureadServicePrincipal(d) => &d.id,
            ResourceModel::ServerRole(d) => &d.id,
            ResourceModel::ServerRoleMember(d) => &d.id,
            ResourceModel::SqlLogin(d) => &d.id,
            ResourceModel::DatabasePermission(d) => &d.id,
            ResourceModel::SchemaPermission(d) => &d.id,
        };
        id.as_deref()
    }
}
