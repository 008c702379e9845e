//! Minimal resource state rebuilt from a kind and a stored id, enough for
//! `read` and `delete`. Attributes the id does not determine are left blank
//! and filled in by the next read.

use sqlgrant_domain::{
    AadObjectId, AzureAdServicePrincipalData, AzureAdUserData, ClientId, DatabaseData, DatabaseId,
    DatabasePermissionData, DatabasePermissionId, DatabaseRoleData, DatabaseRoleId,
    DatabaseRoleMemberData, DatabaseScoped, LoginId, ResourceModel, SchemaData, SchemaId,
    SchemaPermissionData, SchemaPermissionId, ServerRoleData, ServerRoleId, ServerRoleMemberData,
    ServerRoleMemberId, SqlLoginData, SqlUserData, UserId, RoleMemberId,
};
use uuid::Uuid;

use crate::error::ResourceError;

/// Every resource kind, in manifest spelling.
pub const KINDS: &[&str] = &[
    "database",
    "schema",
    "database_role",
    "database_role_member",
    "sql_user",
    "azuread_user",
    "azuread_service_principal",
    "server_role",
    "server_role_member",
    "sql_login",
    "database_permission",
    "schema_permission",
];

pub fn seed(kind: &str, id: &str) -> Result<ResourceModel, ResourceError> {
    let stored = Some(id.to_string());
    let model = match kind {
        "database" => {
            let _: DatabaseId = id.parse()?;
            ResourceModel::Database(DatabaseData { id: stored, name: String::new(), collation: None })
        }
        "schema" => {
            let key: DatabaseScoped<SchemaId> = id.parse()?;
            ResourceModel::Schema(SchemaData {
                id: stored,
                database_id: key.database_id,
                name: String::new(),
                owner_id: None,
            })
        }
        "database_role" => {
            let key: DatabaseScoped<DatabaseRoleId> = id.parse()?;
            ResourceModel::DatabaseRole(DatabaseRoleData {
                id: stored,
                database_id: key.database_id,
                name: String::new(),
                owner_id: None,
            })
        }
        "database_role_member" => {
            let key: RoleMemberId = id.parse()?;
            ResourceModel::DatabaseRoleMember(DatabaseRoleMemberData {
                id: stored,
                role_id: DatabaseScoped::new(key.database_id, key.role_id).to_string(),
                member_id: DatabaseScoped::new(key.database_id, key.member_id).to_string(),
            })
        }
        "sql_user" => {
            let key: DatabaseScoped<UserId> = id.parse()?;
            ResourceModel::SqlUser(SqlUserData {
                id: stored,
                database_id: key.database_id,
                name: String::new(),
                login_id: LoginId::from_sid(&[]),
            })
        }
        "azuread_user" => {
            let key: DatabaseScoped<UserId> = id.parse()?;
            ResourceModel::AzureadUser(AzureAdUserData {
                id: stored,
                database_id: key.database_id,
                name: String::new(),
                user_object_id: AadObjectId::new(Uuid::nil()),
            })
        }
        "azuread_service_principal" => {
            let key: DatabaseScoped<UserId> = id.parse()?;
            ResourceModel::AzureadServicePrincipal(AzureAdServicePrincipalData {
                id: stored,
                database_id: key.database_id,
                name: String::new(),
                client_id: ClientId::new(Uuid::nil()),
            })
        }
        "server_role" => {
            let _: ServerRoleId = id.parse()?;
            ResourceModel::ServerRole(ServerRoleData { id: stored, name: String::new(), owner_id: None })
        }
        "server_role_member" => {
            let key: ServerRoleMemberId = id.parse()?;
            ResourceModel::ServerRoleMember(ServerRoleMemberData {
                id: stored,
                role_id: key.role_id,
                member_id: key.member_id,
            })
        }
        "sql_login" => {
            let _: LoginId = id.parse()?;
            ResourceModel::SqlLogin(SqlLoginData {
                id: stored,
                name: String::new(),
                password: None,
                must_change_password: false,
                default_database_id: DatabaseId::MASTER,
                default_language: None,
                check_password_expiration: true,
                check_password_policy: true,
                principal_id: None,
            })
        }
        "database_permission" => {
            let key: DatabasePermissionId = id.parse()?;
            ResourceModel::DatabasePermission(DatabasePermissionData {
                id: stored,
                principal_id: DatabaseScoped::new(key.database_id, key.principal_id).to_string(),
                permission: key.permission,
                with_grant_option: false,
            })
        }
        "schema_permission" => {
            let key: SchemaPermissionId = id.parse()?;
            ResourceModel::SchemaPermission(SchemaPermissionData {
                id: stored,
                schema_id: DatabaseScoped::new(key.database_id, key.schema_id).to_string(),
                principal_id: DatabaseScoped::new(key.database_id, key.principal_id).to_string(),
                permission: key.permission,
                with_grant_option: false,
            })
        }
        other => {
            return Err(ResourceError::Configuration(format!(
                "unknown resource kind '{other}'; expected one of {}",
                KINDS.join(", ")
            )))
        }
    };
    Ok(model)
}
