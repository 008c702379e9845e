pub mod database;
pub mod database_role;
pub mod permission;
pub mod role_member;
pub mod schema;
pub mod server_role;
pub mod sql_login;
pub mod user;

pub use database::DatabaseResource;
pub use database_role::DatabaseRoleResource;
pub use permission::{DatabasePermissionResource, SchemaPermissionResource};
pub use role_member::{DatabaseRoleMemberResource, ServerRoleMemberResource};
pub use schema::SchemaResource;
pub use server_role::ServerRoleResource;
pub use sql_login::SqlLoginResource;
pub use user::{AzureAdServicePrincipalResource, AzureAdUserResource, SqlUserResource};
