//! Explicit GRANT state of one principal, either on the current database or
//! on a single schema.

use sqlgrant_domain::{DatabasePrincipalId, Permission, PermissionName, SchemaId};
use tracing::debug;

use crate::connection::Connection;
use crate::error::SqlError;
use crate::principal::{expect_principal, principal_name};
use crate::quote::quote_ident;
use crate::value::SqlValue;
use crate::values;

/// Securable a permission set is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Securable {
    Database,
    Schema(SchemaId),
}

#[derive(Clone, Copy)]
struct Grants<'c> {
    conn: &'c dyn Connection,
    securable: Securable,
    principal_id: DatabasePrincipalId,
}

impl<'c> Grants<'c> {
    async fn list(&self) -> Result<Vec<Permission>, SqlError> {
        let (sql, args): (&str, Vec<SqlValue>) = match self.securable {
            Securable::Database => (
                "SELECT [permission_name], [state] FROM sys.database_permissions WHERE [class] = 0 AND [grantee_principal_id] = @p1 AND [state] IN ('G', 'W')",
                values![self.principal_id],
            ),
            Securable::Schema(schema_id) => (
                "SELECT [permission_name], [state] FROM sys.database_permissions WHERE [class] = 3 AND [major_id] = @p1 AND [grantee_principal_id] = @p2 AND [state] IN ('G', 'W')",
                values![schema_id, self.principal_id],
            ),
        };
        let rows = self.conn.query(sql, &args).await?;
        rows.iter()
            .map(|row| -> Result<Permission, SqlError> {
                Ok(Permission {
                    name: row.string(0)?.parse()?,
                    with_grant_option: row.string(1)?.trim() == "W",
                })
            })
            .collect()
    }

    async fn get(&self, name: &PermissionName) -> Result<Permission, SqlError> {
        self.list()
            .await?
            .into_iter()
            .find(|p| &p.name == name)
            .ok_or_else(|| SqlError::not_found("permission", name))
    }

    /// ` ON schema::[s]` or nothing for the database itself.
    async fn on_clause(&self) -> Result<String, SqlError> {
        match self.securable {
            Securable::Database => Ok(String::new()),
            Securable::Schema(id) => {
                let name = crate::connection::scalar_string(
                    self.conn,
                    "SELECT SCHEMA_NAME(@p1)",
                    &values![id],
                )
                .await?
                .ok_or_else(|| SqlError::not_found("schema", id))?;
                Ok(format!(" ON schema::{}", quote_ident(&name)))
            }
        }
    }

    async fn grant(&self, permission: &Permission) -> Result<(), SqlError> {
        let on = self.on_clause().await?;
        let grantee = principal_name(self.conn, "database principal", self.principal_id).await?;
        let mut sql = format!("GRANT {}{on} TO {}", permission.name, quote_ident(&grantee));
        if permission.with_grant_option {
            sql.push_str(" WITH GRANT OPTION");
        }
        self.conn.exec(&sql, &[]).await?;
        debug!("Granted {}{on} to {grantee}", permission.name);
        Ok(())
    }

    async fn revoke(&self, name: &PermissionName) -> Result<(), SqlError> {
        let on = self.on_clause().await?;
        let grantee = principal_name(self.conn, "database principal", self.principal_id).await?;
        self.conn
            .exec(&format!("REVOKE {name}{on} FROM {} CASCADE", quote_ident(&grantee)), &[])
            .await?;
        debug!("Revoked {name}{on} from {grantee}");
        Ok(())
    }

    /// Toggle `WITH GRANT OPTION` without revoking the permission itself.
    async fn set_grant_option(&self, name: &PermissionName, with_grant_option: bool) -> Result<(), SqlError> {
        if with_grant_option {
            return self
                .grant(&Permission { name: name.clone(), with_grant_option: true })
                .await;
        }
        let on = self.on_clause().await?;
        let grantee = principal_name(self.conn, "database principal", self.principal_id).await?;
        self.conn
            .exec(
                &format!("REVOKE GRANT OPTION FOR {name}{on} FROM {} CASCADE", quote_ident(&grantee)),
                &[],
            )
            .await?;
        Ok(())
    }
}

async fn grants<'c>(
    conn: &'c dyn Connection,
    securable: Securable,
    principal_id: DatabasePrincipalId,
) -> Result<Grants<'c>, SqlError> {
    expect_principal(conn, "database principal", principal_id, |_| true).await?;
    Ok(Grants { conn, securable, principal_id })
}

/// Database-level permissions held by one principal.
#[derive(Clone, Copy)]
pub struct DatabasePermissions<'c>(Grants<'c>);

impl<'c> DatabasePermissions<'c> {
    pub async fn get(
        conn: &'c dyn Connection,
        principal_id: DatabasePrincipalId,
    ) -> Result<DatabasePermissions<'c>, SqlError> {
        grants(conn, Securable::Database, principal_id).await.map(DatabasePermissions)
    }

    pub fn principal_id(&self) -> DatabasePrincipalId {
        self.0.principal_id
    }

    pub async fn list(&self) -> Result<Vec<Permission>, SqlError> {
        self.0.list().await
    }

    pub async fn permission(&self, name: &PermissionName) -> Result<Permission, SqlError> {
        self.0.get(name).await
    }

    pub async fn grant(&self, permission: &Permission) -> Result<(), SqlError> {
        self.0.grant(permission).await
    }

    pub async fn revoke(&self, name: &PermissionName) -> Result<(), SqlError> {
        self.0.revoke(name).await
    }

    pub async fn set_grant_option(&self, name: &PermissionName, with_grant_option: bool) -> Result<(), SqlError> {
        self.0.set_grant_option(name, with_grant_option).await
    }
}

/// Permissions one principal holds on one schema.
#[derive(Clone, Copy)]
pub struct SchemaPermissions<'c> {
    grants: Grants<'c>,
    schema_id: SchemaId,
}

impl<'c> SchemaPermissions<'c> {
    pub async fn get(
        conn: &'c dyn Connection,
        schema_id: SchemaId,
        principal_id: DatabasePrincipalId,
    ) -> Result<SchemaPermissions<'c>, SqlError> {
        crate::connection::scalar_string(conn, "SELECT SCHEMA_NAME(@p1)", &values![schema_id])
            .await?
            .ok_or_else(|| SqlError::not_found("schema", schema_id))?;
        let grants = grants(conn, Securable::Schema(schema_id), principal_id).await?;
        Ok(SchemaPermissions { grants, schema_id })
    }

    pub fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    pub fn principal_id(&self) -> DatabasePrincipalId {
        self.grants.principal_id
    }

    pub async fn list(&self) -> Result<Vec<Permission>, SqlError> {
        self.grants.list().await
    }

    pub async fn permission(&self, name: &PermissionName) -> Result<Permission, SqlError> {
        self.grants.get(name).await
    }

    pub async fn grant(&self, permission: &Permission) -> Result<(), SqlError> {
        self.grants.grant(permission).await
    }

    pub async fn revoke(&self, name: &PermissionName) -> Result<(), SqlError> {
        self.grants.revoke(name).await
    }

    pub async fn set_grant_option(&self, name: &PermissionName, with_grant_option: bool) -> Result<(), SqlError> {
        self.grants.set_grant_option(name, with_grant_option).await
    }
}
