//! Catalog lookups shared by users and database roles.

use sqlgrant_domain::{DatabasePrincipalId, PrincipalType};

use crate::connection::Connection;
use crate::error::SqlError;
use crate::value::Row;
use crate::values;

fn decode_type(row: &Row, idx: usize) -> Result<PrincipalType, SqlError> {
    let code = row.string(idx)?;
    PrincipalType::from_code(&code)
        .ok_or_else(|| SqlError::Decode(format!("unknown principal type '{code}'")))
}

/// Type of a database principal, `None` when the id does not resolve.
pub(crate) async fn principal_type(
    conn: &dyn Connection,
    id: DatabasePrincipalId,
) -> Result<Option<PrincipalType>, SqlError> {
    let row = conn
        .query_row(
            "SELECT [type] FROM sys.database_principals WHERE [principal_id] = @p1",
            &values![id],
        )
        .await?;
    row.map(|r| decode_type(&r, 0)).transpose()
}

/// Id and type of the database principal with the given name.
pub(crate) async fn principal_by_name(
    conn: &dyn Connection,
    name: &str,
) -> Result<Option<(DatabasePrincipalId, PrincipalType)>, SqlError> {
    let row = conn
        .query_row(
            "SELECT [principal_id], [type] FROM sys.database_principals WHERE [name] = @p1",
            &values![name],
        )
        .await?;
    match row {
        Some(r) => Ok(Some((DatabasePrincipalId(r.i32(0)?), decode_type(&r, 1)?))),
        None => Ok(None),
    }
}

pub(crate) async fn principal_name(
    conn: &dyn Connection,
    kind: &'static str,
    id: DatabasePrincipalId,
) -> Result<String, SqlError> {
    crate::connection::scalar_string(conn, "SELECT USER_NAME(@p1)", &values![id])
        .await?
        .ok_or_else(|| SqlError::not_found(kind, id))
}

/// Principals with this id exist and have one of the accepted types.
pub(crate) async fn expect_principal(
    conn: &dyn Connection,
    kind: &'static str,
    id: DatabasePrincipalId,
    accept: impl Fn(PrincipalType) -> bool,
) -> Result<PrincipalType, SqlError> {
    match principal_type(conn, id).await? {
        None => Err(SqlError::not_found(kind, id)),
        Some(t) if accept(t) => Ok(t),
        Some(t) => Err(SqlError::type_mismatch(id, kind, t)),
    }
}
