use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use sqlgrant_domain::DatabasePrincipalId;
use tokio_util::sync::CancellationToken;

use crate::error::SqlError;
use crate::value::{Row, SqlValue};

/// Owner name used in DDL when no explicit owner was requested.
pub const SELF_PRINCIPAL: &str = "self";

/// A live handle to a SQL Server instance or one of its databases.
///
/// Every call is one synchronous round trip with no implicit transaction.
/// Placeholders in `query` are written `@p1`, `@p2`, … and only ever bind
/// scalar values, never identifiers.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Execute a statement and return the number of rows affected.
    async fn exec(&self, query: &str, args: &[SqlValue]) -> Result<u64, SqlError>;

    /// Run a query and collect the rows of its first result set.
    async fn query(&self, query: &str, args: &[SqlValue]) -> Result<Vec<Row>, SqlError>;

    /// Open a connection scoped to the named database on the same server.
    async fn for_database(&self, name: &str) -> Result<Arc<dyn Connection>, SqlError>;

    /// First row of a query, if any.
    async fn query_row(&self, query: &str, args: &[SqlValue]) -> Result<Option<Row>, SqlError> {
        Ok(self.query(query, args).await?.into_iter().next())
    }

    /// Current name of a database principal, as needed for ownership clauses.
    async fn get_user_name(&self, id: DatabasePrincipalId) -> Result<String, SqlError> {
        if id.is_empty() {
            return Ok(SELF_PRINCIPAL.to_string());
        }
        scalar_string(self, "SELECT USER_NAME(@p1)", &[id.into()])
            .await?
            .ok_or_else(|| SqlError::not_found("database principal", id))
    }
}

/// First column of the first row as an integer; `None` for no row or NULL.
pub(crate) async fn scalar_i32<C: Connection + ?Sized>(
    conn: &C,
    query: &str,
    args: &[SqlValue],
) -> Result<Option<i32>, SqlError> {
    match conn.query_row(query, args).await? {
        Some(row) => row.opt_i32(0),
        None => Ok(None),
    }
}

/// First column of the first row as text; `None` for no row or NULL.
pub(crate) async fn scalar_string<C: Connection + ?Sized>(
    conn: &C,
    query: &str,
    args: &[SqlValue],
) -> Result<Option<String>, SqlError> {
    match conn.query_row(query, args).await? {
        Some(row) => row.opt_string(0),
        None => Ok(None),
    }
}

/// Ties every statement issued through the wrapped connection to a
/// cancellation token. Cancelling the token drops the in-flight statement
/// and surfaces [`SqlError::Cancelled`].
#[derive(Clone)]
pub struct Cancellable {
    inner: Arc<dyn Connection>,
    token: CancellationToken,
}

impl Cancellable {
    pub fn new(inner: Arc<dyn Connection>, token: CancellationToken) -> Self {
        Self { inner, token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    async fn guard<T, F>(&self, fut: F) -> Result<T, SqlError>
    where
        F: Future<Output = Result<T, SqlError>> + Send,
    {
        if self.token.is_cancelled() {
            return Err(SqlError::Cancelled("operation cancelled before statement was sent".into()));
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SqlError::Cancelled("statement aborted".into())),
            res = fut => res,
        }
    }
}

#[async_trait]
impl Connection for Cancellable {
    async fn exec(&self, query: &str, args: &[SqlValue]) -> Result<u64, SqlError> {
        self.guard(self.inner.exec(query, args)).await
    }

    async fn query(&self, query: &str, args: &[SqlValue]) -> Result<Vec<Row>, SqlError> {
        self.guard(self.inner.query(query, args)).await
    }

    async fn for_database(&self, name: &str) -> Result<Arc<dyn Connection>, SqlError> {
        let inner = self.guard(self.inner.for_database(name)).await?;
        Ok(Arc::new(Cancellable::new(inner, self.token.clone())))
    }

    async fn get_user_name(&self, id: DatabasePrincipalId) -> Result<String, SqlError> {
        self.guard(self.inner.get_user_name(id)).await
    }
}
