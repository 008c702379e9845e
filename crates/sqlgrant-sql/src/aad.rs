//! Resolution of Azure AD principals mapped into a database.
//!
//! External principals can be found by directory name or by the GUID their
//! SID was derived from (object id for users and groups, client id for
//! service principals). A missing principal, a principal of the wrong type
//! and a SID matching several rows are reported as distinct errors.

use sqlgrant_domain::{PrincipalType, UserId, UserType};
use uuid::Uuid;

use crate::connection::Connection;
use crate::error::SqlError;
use crate::principal::principal_by_name;
use crate::quote::aad_sid_expr;
use crate::user::User;
use crate::value::Row;
use crate::values;

/// Which kind of external principal the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AadPrincipalKind {
    /// User or group (`E` or `X`).
    User,
    /// Application identity (`E`).
    ServicePrincipal,
}

impl AadPrincipalKind {
    fn label(self) -> &'static str {
        match self {
            AadPrincipalKind::User => "Azure AD user",
            AadPrincipalKind::ServicePrincipal => "Azure AD service principal",
        }
    }

    fn accepts(self, t: PrincipalType) -> bool {
        match self {
            AadPrincipalKind::User => matches!(
                t,
                PrincipalType::User(UserType::AzureAd | UserType::AzureAdGroup)
            ),
            AadPrincipalKind::ServicePrincipal => t == PrincipalType::User(UserType::AzureAd),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AadKey<'a> {
    Name(&'a str),
    /// Object id or client id the SID was derived from.
    Guid(Uuid),
}

pub async fn find_aad_principal<'c>(
    conn: &'c dyn Connection,
    kind: AadPrincipalKind,
    key: AadKey<'_>,
) -> Result<User<'c>, SqlError> {
    let (id, found, key_text) = match key {
        AadKey::Name(name) => match principal_by_name(conn, name).await? {
            None => return Err(SqlError::not_found(kind.label(), name)),
            Some((id, t)) => (id.0, t, name.to_string()),
        },
        AadKey::Guid(guid) => {
            let text = guid.hyphenated().to_string().to_uppercase();
            let rows = conn
                .query(
                    &format!(
                        "SELECT [principal_id], [type] FROM sys.database_principals WHERE CONVERT(VARCHAR(85), [sid], 1) = {}",
                        aad_sid_expr(1)
                    ),
                    &values![text.as_str()],
                )
                .await?;
            let row = single(rows, kind.label(), &text)?;
            let t = decode(&row)?;
            (row.i32(0)?, t, text)
        }
    };

    if !kind.accepts(found) {
        return Err(SqlError::type_mismatch(key_text, kind.label(), found));
    }
    Ok(User { conn, id: UserId(id) })
}

fn single(rows: Vec<Row>, kind: &'static str, key: &str) -> Result<Row, SqlError> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (None, _) => Err(SqlError::not_found(kind, key)),
        (Some(row), None) => Ok(row),
        (Some(_), Some(_)) => Err(SqlError::Ambiguous { kind, key: key.to_string() }),
    }
}

fn decode(row: &Row) -> Result<PrincipalType, SqlError> {
    let code = row.string(1)?;
    PrincipalType::from_code(&code)
        .ok_or_else(|| SqlError::Decode(format!("unknown principal type '{code}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::mock::MockConnection;

    const BY_SID: &str = "SELECT [principal_id], [type] FROM sys.database_principals WHERE CONVERT(VARCHAR(85), [sid], 1) = CONVERT(VARCHAR(85), CONVERT(VARBINARY(85), CAST(@p1 AS UNIQUEIDENTIFIER), 1), 1)";
    const BY_NAME: &str = "SELECT [principal_id], [type] FROM sys.database_principals WHERE [name] = @p1";

    fn guid() -> Uuid {
        Uuid::parse_str("a80e3c16-88a3-4218-ab27-4e25ef196bbf").unwrap()
    }

    #[tokio::test]
    async fn missing_name_does_not_exist() {
        let mock = MockConnection::new();
        mock.expect_query(BY_NAME)
            .with_args(values!["not_existing_name"])
            .will_return_rows(vec![]);

        let err = find_aad_principal(&mock, AadPrincipalKind::ServicePrincipal, AadKey::Name("not_existing_name"))
            .await
            .err()
            .unwrap();

        assert!(err.to_string().contains("not exist"));
    }

    #[tokio::test]
    async fn missing_guid_does_not_exist() {
        let mock = MockConnection::new();
        mock.expect_query(BY_SID)
            .with_args(values!["A80E3C16-88A3-4218-AB27-4E25EF196BBF"])
            .will_return_rows(vec![]);

        let err = find_aad_principal(&mock, AadPrincipalKind::User, AadKey::Guid(guid()))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SqlError::NotFound { .. }));
        assert!(err.to_string().contains("not exist"));
    }

    #[tokio::test]
    async fn sql_user_with_requested_name_is_a_type_mismatch() {
        let mock = MockConnection::new();
        mock.expect_query(BY_NAME)
            .with_args(values!["app"])
            .will_return_rows(vec![values![5, "S"]]);

        let err = find_aad_principal(&mock, AadPrincipalKind::User, AadKey::Name("app"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SqlError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn group_is_not_a_service_principal() {
        let mock = MockConnection::new();
        mock.expect_query(BY_SID)
            .with_args(values!["A80E3C16-88A3-4218-AB27-4E25EF196BBF"])
            .will_return_rows(vec![values![5, "X"]]);

        let err = find_aad_principal(&mock, AadPrincipalKind::ServicePrincipal, AadKey::Guid(guid()))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SqlError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn duplicate_sid_is_ambiguous() {
        let mock = MockConnection::new();
        mock.expect_query(BY_SID)
            .with_args(values!["A80E3C16-88A3-4218-AB27-4E25EF196BBF"])
            .will_return_rows(vec![values![5, "E"], values![6, "E"]]);

        let err = find_aad_principal(&mock, AadPrincipalKind::User, AadKey::Guid(guid()))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SqlError::Ambiguous { .. }));
    }

    #[tokio::test]
    async fn found_by_guid() {
        let mock = MockConnection::new();
        mock.expect_query(BY_SID)
            .with_args(values!["A80E3C16-88A3-4218-AB27-4E25EF196BBF"])
            .will_return_rows(vec![values![14, "E"]]);

        let user = find_aad_principal(&mock, AadPrincipalKind::ServicePrincipal, AadKey::Guid(guid()))
            .await
            .unwrap();

        assert_eq!(user.id(), UserId(14));
        mock.verify();
    }
}
