use async_trait::async_trait;
use sqlgrant_domain::{
    validate_name, AadObjectId, DomainError, LoginId, PrincipalType, UserId, UserSettings,
    UserType,
};
use tracing::debug;

use crate::connection::{scalar_string, Connection};
use crate::entity::{Entity, Renameable};
use crate::error::SqlError;
use crate::principal::{expect_principal, principal_by_name, principal_name};
use crate::quote::{aad_sid_expr, quote_ident};
use crate::values;

const KIND: &str = "user";

#[derive(Clone, Copy)]
pub struct User<'c> {
    pub(crate) conn: &'c dyn Connection,
    pub(crate) id: UserId,
}

impl<'c> User<'c> {
    pub async fn get(conn: &'c dyn Connection, id: UserId) -> Result<User<'c>, SqlError> {
        expect_principal(conn, KIND, id.into(), |t| matches!(t, PrincipalType::User(_))).await?;
        Ok(User { conn, id })
    }

    pub async fn get_by_name(conn: &'c dyn Connection, name: &str) -> Result<User<'c>, SqlError> {
        match principal_by_name(conn, name).await? {
            None => Err(SqlError::not_found(KIND, name)),
            Some((id, PrincipalType::User(_))) => Ok(User { conn, id: UserId(id.0) }),
            Some((_, other)) => Err(SqlError::type_mismatch(name, KIND, other)),
        }
    }

    /// Create a SQL user mapped to a login, or an Azure AD user or group
    /// bound to its object id. Windows users are not provisioned.
    pub async fn create(conn: &'c dyn Connection, settings: &UserSettings) -> Result<User<'c>, SqlError> {
        validate_name(&settings.name)?;
        match settings.user_type {
            UserType::Sql => {
                let login_id = settings.login_id.as_ref().ok_or_else(|| {
                    DomainError::InvalidConfig("SQL user requires a login_id".into())
                })?;
                let login = login_name(conn, login_id).await?;
                conn.exec(
                    &format!(
                        "CREATE USER {} FOR LOGIN {}",
                        quote_ident(&settings.name),
                        quote_ident(&login)
                    ),
                    &[],
                )
                .await?;
            }
            UserType::AzureAd | UserType::AzureAdGroup => {
                let object_id = settings.aad_object_id.ok_or_else(|| {
                    DomainError::InvalidConfig("Azure AD user requires an object id".into())
                })?;
                // Groups are type X; users and service principals are type E.
                conn.exec(
                    &format!(
                        "DECLARE @SQL NVARCHAR(MAX) = 'CREATE USER ' + QUOTENAME(@p1) + ' WITH SID=' + (SELECT {}) + ', TYPE={}'; EXEC(@SQL)",
                        aad_sid_expr(2),
                        settings.user_type.code()
                    ),
                    &values![settings.name.as_str(), object_id.to_string()],
                )
                .await?;
            }
            other => {
                return Err(DomainError::InvalidConfig(format!("cannot create a {other}")).into());
            }
        }
        debug!("Created {} {}", settings.user_type, settings.name);
        Self::get_by_name(conn, &settings.name).await
    }
}

async fn login_name(conn: &dyn Connection, login_id: &LoginId) -> Result<String, SqlError> {
    scalar_string(
        conn,
        "SELECT SUSER_SNAME(CONVERT(VARBINARY(85), @p1, 1))",
        &values![login_id.as_str()],
    )
    .await?
    .ok_or_else(|| SqlError::not_found("login", login_id))
}

fn sid_bytes(text: &str) -> Result<Vec<u8>, SqlError> {
    text.strip_prefix("0x")
        .and_then(|digits| hex::decode(digits).ok())
        .ok_or_else(|| SqlError::Decode(format!("malformed SID '{text}'")))
}

#[async_trait]
impl<'c> Entity for User<'c> {
    type Id = UserId;
    type Settings = UserSettings;

    fn id(&self) -> UserId {
        self.id
    }

    async fn name(&self) -> Result<String, SqlError> {
        principal_name(self.conn, KIND, self.id.into()).await
    }

    async fn settings(&self) -> Result<UserSettings, SqlError> {
        let row = self
            .conn
            .query_row(
                "SELECT [name], [type], CONVERT(VARCHAR(85), [sid], 1) FROM sys.database_principals WHERE [principal_id] = @p1",
                &values![self.id],
            )
            .await?
            .ok_or_else(|| SqlError::not_found(KIND, self.id))?;

        let name = row.string(0)?;
        let code = row.string(1)?;
        let user_type = UserType::from_code(&code)
            .ok_or_else(|| SqlError::type_mismatch(self.id, KIND, code.trim()))?;
        let sid = row.opt_string(2)?;

        let mut settings = UserSettings { name, user_type, login_id: None, aad_object_id: None };
        match (user_type, sid) {
            (UserType::Sql, Some(sid)) => {
                settings.login_id = Some(sid.parse::<LoginId>()?);
            }
            (t, Some(sid)) if t.is_external() => {
                settings.aad_object_id = Some(AadObjectId::from_sid(&sid_bytes(&sid)?)?);
            }
            _ => {}
        }
        Ok(settings)
    }

    async fn drop(&self) -> Result<(), SqlError> {
        let name = self.name().await?;
        self.conn
            .exec(&format!("DROP USER {}", quote_ident(&name)), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<'c> Renameable for User<'c> {
    async fn rename(&self, new_name: &str) -> Result<(), SqlError> {
        validate_name(new_name)?;
        let current = self.name().await?;
        self.conn
            .exec(
                &format!(
                    "ALTER USER {} WITH NAME = {}",
                    quote_ident(&current),
                    quote_ident(new_name)
                ),
                &[],
            )
            .await?;
        Ok(())
    }
}
