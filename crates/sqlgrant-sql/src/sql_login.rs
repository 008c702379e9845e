//! SQL-authenticated server logins.
//!
//! Passwords never appear in statement text: they are bound as `@p1` and
//! spliced by the server with `QUOTENAME(@p1, '''')` inside a dynamic SQL
//! batch. The server never returns them, so settings read back always
//! carry `password: None`.

use async_trait::async_trait;
use sqlgrant_domain::{
    validate_name, DatabaseId, DomainError, LoginId, ServerPrincipalId, SqlLoginSettings,
};
use tracing::debug;

use crate::connection::{scalar_i32, scalar_string, Connection};
use crate::entity::{Entity, Renameable};
use crate::error::SqlError;
use crate::quote::{escape_literal, quote_ident};
use crate::values;

const KIND: &str = "SQL login";

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

async fn database_name(conn: &dyn Connection, id: DatabaseId) -> Result<String, SqlError> {
    scalar_string(conn, "SELECT DB_NAME(@p1)", &values![id])
        .await?
        .ok_or_else(|| SqlError::not_found("database", id))
}

/// `, DEFAULT_DATABASE=[db], DEFAULT_LANGUAGE=[lang], CHECK_EXPIRATION=ON, CHECK_POLICY=ON`
fn option_list(settings: &SqlLoginSettings, default_database: &str) -> String {
    let mut opts = vec![format!("DEFAULT_DATABASE={}", quote_ident(default_database))];
    if let Some(lang) = &settings.default_language {
        opts.push(format!("DEFAULT_LANGUAGE={}", quote_ident(lang)));
    }
    opts.push(format!("CHECK_EXPIRATION={}", on_off(settings.check_password_expiration)));
    opts.push(format!("CHECK_POLICY={}", on_off(settings.check_password_policy)));
    opts.join(", ")
}

/// Dynamic batch `<head> WITH PASSWORD='<@p1>'[ MUST_CHANGE][, <tail>]`.
fn password_batch(head: &str, must_change: bool, tail: Option<&str>) -> String {
    let mut rest = String::new();
    if must_change {
        rest.push_str(" MUST_CHANGE");
    }
    if let Some(tail) = tail {
        rest.push_str(", ");
        rest.push_str(tail);
    }
    format!(
        "DECLARE @SQL NVARCHAR(MAX) = N'{} WITH PASSWORD=' + QUOTENAME(@p1, '''') + N'{}'; EXEC (@SQL)",
        escape_literal(head),
        escape_literal(&rest)
    )
}

#[derive(Clone)]
pub struct SqlLogin<'c> {
    conn: &'c dyn Connection,
    id: LoginId,
}

impl<'c> SqlLogin<'c> {
    pub async fn get(conn: &'c dyn Connection, id: LoginId) -> Result<SqlLogin<'c>, SqlError> {
        let login = SqlLogin { conn, id };
        login.name().await?;
        Ok(login)
    }

    pub async fn get_by_name(conn: &'c dyn Connection, name: &str) -> Result<SqlLogin<'c>, SqlError> {
        let sid = scalar_string(
            conn,
            "SELECT CONVERT(VARCHAR(85), [sid], 1) FROM sys.sql_logins WHERE [name] = @p1",
            &values![name],
        )
        .await?
        .ok_or_else(|| SqlError::not_found(KIND, name))?;
        Ok(SqlLogin { conn, id: sid.parse()? })
    }

    pub async fn create(
        conn: &'c dyn Connection,
        settings: &SqlLoginSettings,
    ) -> Result<SqlLogin<'c>, SqlError> {
        settings.validate()?;
        let password = settings
            .password
            .as_deref()
            .ok_or_else(|| DomainError::InvalidConfig("SQL login requires a password".into()))?;
        let default_database = database_name(conn, settings.default_database_id).await?;
        let head = format!("CREATE LOGIN {}", quote_ident(&settings.name));
        let opts = option_list(settings, &default_database);
        conn.exec(
            &password_batch(&head, settings.must_change_password, Some(&opts)),
            &values![password],
        )
        .await?;
        debug!("Created SQL login {}", settings.name);
        Self::get_by_name(conn, &settings.name).await
    }

    /// Apply options and, when given, a new password. Options go first so
    /// that `MUST_CHANGE` finds expiration checking already enabled.
    pub async fn update_settings(&self, settings: &SqlLoginSettings) -> Result<(), SqlError> {
        settings.validate()?;
        let name = self.name().await?;
        let default_database = database_name(self.conn, settings.default_database_id).await?;
        self.conn
            .exec(
                &format!(
                    "ALTER LOGIN {} WITH {}",
                    quote_ident(&name),
                    option_list(settings, &default_database)
                ),
                &[],
            )
            .await?;
        if let Some(password) = &settings.password {
            let head = format!("ALTER LOGIN {}", quote_ident(&name));
            self.conn
                .exec(
                    &password_batch(&head, settings.must_change_password, None),
                    &values![password],
                )
                .await?;
        }
        Ok(())
    }

    /// `sys.server_principals.principal_id` of the login, used for role membership.
    pub async fn principal_id(&self) -> Result<ServerPrincipalId, SqlError> {
        scalar_i32(
            self.conn,
            "SELECT [principal_id] FROM sys.server_principals WHERE [sid] = CONVERT(VARBINARY(85), @p1, 1)",
            &values![self.id.as_str()],
        )
        .await?
        .map(ServerPrincipalId)
        .ok_or_else(|| SqlError::not_found(KIND, &self.id))
    }
}

#[async_trait]
impl<'c> Entity for SqlLogin<'c> {
    type Id = LoginId;
    type Settings = SqlLoginSettings;

    fn id(&self) -> LoginId {
        self.id.clone()
    }

    async fn name(&self) -> Result<String, SqlError> {
        scalar_string(
            self.conn,
            "SELECT [name] FROM sys.sql_logins WHERE [sid] = CONVERT(VARBINARY(85), @p1, 1)",
            &values![self.id.as_str()],
        )
        .await?
        .ok_or_else(|| SqlError::not_found(KIND, &self.id))
    }

    async fn settings(&self) -> Result<SqlLoginSettings, SqlError> {
        let row = self
            .conn
            .query_row(
                "SELECT [name], DB_ID([default_database_name]), [default_language_name], [is_expiration_checked], [is_policy_checked], CONVERT(BIT, LOGINPROPERTY([name], 'IsMustChange')) FROM sys.sql_logins WHERE [sid] = CONVERT(VARBINARY(85), @p1, 1)",
                &values![self.id.as_str()],
            )
            .await?
            .ok_or_else(|| SqlError::not_found(KIND, &self.id))?;
        Ok(SqlLoginSettings {
            name: row.string(0)?,
            password: None,
            default_database_id: DatabaseId(row.opt_i32(1)?.unwrap_or(DatabaseId::MASTER.0)),
            default_language: row.opt_string(2)?,
            check_password_expiration: row.bool(3)?,
            check_password_policy: row.bool(4)?,
            must_change_password: row.bool(5)?,
        })
    }

    async fn drop(&self) -> Result<(), SqlError> {
        let name = self.name().await?;
        self.conn
            .exec(&format!("DROP LOGIN {}", quote_ident(&name)), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<'c> Renameable for SqlLogin<'c> {
    async fn rename(&self, new_name: &str) -> Result<(), SqlError> {
        validate_name(new_name)?;
        let current = self.name().await?;
        self.conn
            .exec(
                &format!(
                    "ALTER LOGIN {} WITH NAME = {}",
                    quote_ident(&current),
                    quote_ident(new_name)
                ),
                &[],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnection;

    const SID: &str = "0x5F2A11C3";
    const NAME: &str = "SELECT [name] FROM sys.sql_logins WHERE [sid] = CONVERT(VARBINARY(85), @p1, 1)";

    struct Fixture {
        mock: MockConnection,
    }

    impl Fixture {
        fn new() -> Self {
            Self { mock: MockConnection::new() }
        }

        fn expect_name(&self, name: &str) {
            self.mock
                .expect_query(NAME)
                .with_args(values![SID])
                .will_return_rows(vec![values![name]]);
        }

        fn expect_db_name(&self, id: i32, name: &str) {
            self.mock
                .expect_query("SELECT DB_NAME(@p1)")
                .with_args(values![id])
                .will_return_rows(vec![values![name]]);
        }

        async fn login(&self) -> SqlLogin<'_> {
            self.expect_name("app_login");
            SqlLogin::get(&self.mock, SID.parse().unwrap()).await.unwrap()
        }
    }

    fn settings() -> SqlLoginSettings {
        SqlLoginSettings {
            name: "app_login".into(),
            password: Some("S3cret'pass".into()),
            must_change_password: false,
            default_database_id: DatabaseId(5),
            default_language: None,
            check_password_expiration: false,
            check_password_policy: true,
        }
    }

    #[tokio::test]
    async fn create_binds_password() {
        let f = Fixture::new();
        f.expect_db_name(5, "sales");
        f.mock
            .expect_exec("DECLARE @SQL NVARCHAR(MAX) = N'CREATE LOGIN [app_login] WITH PASSWORD=' + QUOTENAME(@p1, '''') + N', DEFAULT_DATABASE=[sales], CHECK_EXPIRATION=OFF, CHECK_POLICY=ON'; EXEC (@SQL)")
            .with_args(values!["S3cret'pass"])
            .will_return_result(0);
        f.mock
            .expect_query("SELECT CONVERT(VARCHAR(85), [sid], 1) FROM sys.sql_logins WHERE [name] = @p1")
            .with_args(values!["app_login"])
            .will_return_rows(vec![values![SID]]);

        let login = SqlLogin::create(&f.mock, &settings()).await.unwrap();

        assert_eq!(login.id().as_str(), SID);
        f.mock.verify();
    }

    #[tokio::test]
    async fn create_with_must_change_and_language() {
        let f = Fixture::new();
        f.expect_db_name(1, "master");
        f.mock
            .expect_exec("DECLARE @SQL NVARCHAR(MAX) = N'CREATE LOGIN [o''brien] WITH PASSWORD=' + QUOTENAME(@p1, '''') + N' MUST_CHANGE, DEFAULT_DATABASE=[master], DEFAULT_LANGUAGE=[Polish], CHECK_EXPIRATION=ON, CHECK_POLICY=ON'; EXEC (@SQL)")
            .will_return_result(0);
        f.mock
            .expect_query("SELECT CONVERT(VARCHAR(85), [sid], 1) FROM sys.sql_logins WHERE [name] = @p1")
            .with_args(values!["o'brien"])
            .will_return_rows(vec![values![SID]]);

        let mut s = settings();
        s.name = "o'brien".into();
        s.must_change_password = true;
        s.check_password_expiration = true;
        s.default_database_id = DatabaseId::MASTER;
        s.default_language = Some("Polish".into());
        SqlLogin::create(&f.mock, &s).await.unwrap();
        f.mock.verify();
    }

    #[tokio::test]
    async fn must_change_without_checks_is_rejected() {
        let f = Fixture::new();
        let mut s = settings();
        s.must_change_password = true;

        let err = SqlLogin::create(&f.mock, &s).await.err().unwrap();

        assert!(matches!(err, SqlError::Domain(DomainError::InvalidConfig(_))));
        f.mock.verify();
    }

    #[tokio::test]
    async fn settings_never_carry_password() {
        let f = Fixture::new();
        let login = f.login().await;
        f.mock
            .expect_query("SELECT [name], DB_ID([default_database_name]), [default_language_name], [is_expiration_checked], [is_policy_checked], CONVERT(BIT, LOGINPROPERTY([name], 'IsMustChange')) FROM sys.sql_logins WHERE [sid] = CONVERT(VARBINARY(85), @p1, 1)")
            .with_args(values![SID])
            .will_return_rows(vec![values!["app_login", 5, "us_english", false, true, false]]);

        let read = login.settings().await.unwrap();

        assert_eq!(read.password, None);
        assert_eq!(read.default_database_id, DatabaseId(5));
        assert_eq!(read.default_language.as_deref(), Some("us_english"));
        assert!(!read.check_password_expiration);
        assert!(read.check_password_policy);
        assert!(!read.must_change_password);
    }

    #[tokio::test]
    async fn update_applies_options_then_password() {
        let f = Fixture::new();
        let login = f.login().await;
        f.expect_name("app_login");
        f.expect_db_name(5, "sales");
        f.mock
            .expect_exec("ALTER LOGIN [app_login] WITH DEFAULT_DATABASE=[sales], CHECK_EXPIRATION=OFF, CHECK_POLICY=ON")
            .will_return_result(0);
        f.mock
            .expect_exec("DECLARE @SQL NVARCHAR(MAX) = N'ALTER LOGIN [app_login] WITH PASSWORD=' + QUOTENAME(@p1, '''') + N''; EXEC (@SQL)")
            .with_args(values!["S3cret'pass"])
            .will_return_result(0);

        login.update_settings(&settings()).await.unwrap();
        f.mock.verify();
    }

    #[tokio::test]
    async fn principal_id_and_rename() {
        let f = Fixture::new();
        let login = f.login().await;
        f.mock
            .expect_query("SELECT [principal_id] FROM sys.server_principals WHERE [sid] = CONVERT(VARBINARY(85), @p1, 1)")
            .with_args(values![SID])
            .will_return_rows(vec![values![301]]);
        f.expect_name("app_login");
        f.mock
            .expect_exec("ALTER LOGIN [app_login] WITH NAME = [svc_login]")
            .will_return_result(0);

        assert_eq!(login.principal_id().await.unwrap(), ServerPrincipalId(301));
        login.rename("svc_login").await.unwrap();
        f.mock.verify();
    }

    #[tokio::test]
    async fn drop_login() {
        let f = Fixture::new();
        let login = f.login().await;
        f.expect_name("app_login");
        f.mock.expect_exec("DROP LOGIN [app_login]").will_return_result(0);

        login.drop().await.unwrap();
        f.mock.verify();
    }
}
