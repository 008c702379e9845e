pub mod aad;
pub mod connection;
pub mod database;
pub mod database_role;
pub mod entity;
pub mod error;
pub mod permissions;
pub mod quote;
pub mod schema;
pub mod server_role;
pub mod sql_login;
pub mod tds;
pub mod user;
pub mod value;

mod principal;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use aad::{find_aad_principal, AadKey, AadPrincipalKind};
pub use connection::{Cancellable, Connection, SELF_PRINCIPAL};
pub use database::Database;
pub use database_role::DatabaseRole;
pub use entity::{Entity, Owned, Renameable};
pub use error::SqlError;
pub use permissions::{DatabasePermissions, SchemaPermissions};
pub use schema::Schema;
pub use server_role::ServerRole;
pub use sql_login::SqlLogin;
pub use tds::{TdsAuth, TdsConfig, TdsConnection};
pub use user::User;
pub use value::{Row, SqlValue};
