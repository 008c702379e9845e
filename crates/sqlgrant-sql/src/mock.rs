//! Exact-SQL mock connection.
//!
//! Expectations are consumed strictly in the order they were registered.
//! A statement that does not match the next expectation (kind, text, or
//! arguments) fails with [`SqlError::Execution`] so the operation under
//! test stops exactly where a real server error would stop it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::connection::Connection;
use crate::error::SqlError;
use crate::value::{Row, SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Exec,
    Query,
}

#[derive(Debug, Clone)]
enum Reply {
    Rows(Vec<Row>),
    Affected(u64),
    Error(String),
}

#[derive(Debug, Clone)]
struct Expectation {
    kind: CallKind,
    sql: String,
    args: Option<Vec<SqlValue>>,
    reply: Reply,
}

#[derive(Debug, Default)]
struct State {
    expected: VecDeque<Expectation>,
    databases: Vec<String>,
}

/// Cloning shares the expectation queue, so a clone handed to the code
/// under test can be verified through the original.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<State>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test poisons the lock; the queue is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn expect_exec(&self, sql: &str) -> Expect<'_> {
        Expect::new(self, CallKind::Exec, sql)
    }

    pub fn expect_query(&self, sql: &str) -> Expect<'_> {
        Expect::new(self, CallKind::Query, sql)
    }

    /// Panics unless every registered expectation was consumed.
    pub fn verify(&self) {
        let state = self.lock();
        if !state.expected.is_empty() {
            let pending: Vec<&str> = state.expected.iter().map(|e| e.sql.as_str()).collect();
            panic!("unmet SQL expectations: {pending:#?}");
        }
    }

    /// Names passed to [`Connection::for_database`], in call order.
    pub fn opened_databases(&self) -> Vec<String> {
        self.lock().databases.clone()
    }

    fn next(&self, kind: CallKind, sql: &str, args: &[SqlValue]) -> Result<Reply, SqlError> {
        let mut state = self.lock();
        let Some(exp) = state.expected.pop_front() else {
            return Err(SqlError::Execution(format!(
                "mock: unexpected {kind:?} '{sql}', no more expectations"
            )));
        };
        if exp.kind != kind || exp.sql != sql {
            return Err(SqlError::Execution(format!(
                "mock: expected {:?} '{}', got {kind:?} '{sql}'",
                exp.kind, exp.sql
            )));
        }
        if let Some(expected_args) = &exp.args {
            if expected_args.as_slice() != args {
                return Err(SqlError::Execution(format!(
                    "mock: '{sql}' expected args {expected_args:?}, got {args:?}"
                )));
            }
        }
        Ok(exp.reply)
    }
}

/// Builder returned by [`MockConnection::expect_exec`] / [`MockConnection::expect_query`].
/// The expectation is registered by one of the `will_*` methods.
#[must_use = "an expectation is only registered by a will_* call"]
pub struct Expect<'m> {
    mock: &'m MockConnection,
    kind: CallKind,
    sql: String,
    args: Option<Vec<SqlValue>>,
}

impl<'m> Expect<'m> {
    fn new(mock: &'m MockConnection, kind: CallKind, sql: &str) -> Self {
        Self { mock, kind, sql: sql.to_string(), args: None }
    }

    pub fn with_args(mut self, args: Vec<SqlValue>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn will_return_rows(self, rows: Vec<Vec<SqlValue>>) {
        let rows = rows.into_iter().map(Row::new).collect();
        self.register(Reply::Rows(rows));
    }

    pub fn will_return_result(self, rows_affected: u64) {
        self.register(Reply::Affected(rows_affected));
    }

    pub fn will_return_error(self, message: &str) {
        self.register(Reply::Error(message.to_string()));
    }

    fn register(self, reply: Reply) {
        self.mock.lock().expected.push_back(Expectation {
            kind: self.kind,
            sql: self.sql,
            args: self.args,
            reply,
        });
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn exec(&self, query: &str, args: &[SqlValue]) -> Result<u64, SqlError> {
        match self.next(CallKind::Exec, query, args)? {
            Reply::Affected(n) => Ok(n),
            Reply::Rows(rows) => Ok(rows.len() as u64),
            Reply::Error(msg) => Err(SqlError::Execution(msg)),
        }
    }

    async fn query(&self, query: &str, args: &[SqlValue]) -> Result<Vec<Row>, SqlError> {
        match self.next(CallKind::Query, query, args)? {
            Reply::Rows(rows) => Ok(rows),
            Reply::Affected(_) => Ok(Vec::new()),
            Reply::Error(msg) => Err(SqlError::Execution(msg)),
        }
    }

    async fn for_database(&self, name: &str) -> Result<Arc<dyn Connection>, SqlError> {
        self.lock().databases.push(name.to_string());
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[tokio::test]
    async fn expectations_are_consumed_in_order() {
        let mock = MockConnection::new();
        mock.expect_query("SELECT SCHEMA_ID(@p1)")
            .with_args(values!["a"])
            .will_return_rows(vec![values![1]]);
        mock.expect_exec("DROP SCHEMA [a]").will_return_result(1);

        let row = mock.query_row("SELECT SCHEMA_ID(@p1)", &values!["a"]).await.unwrap();
        assert_eq!(row.unwrap().i32(0).unwrap(), 1);
        assert_eq!(mock.exec("DROP SCHEMA [a]", &[]).await.unwrap(), 1);
        mock.verify();
    }

    #[tokio::test]
    async fn mismatched_text_is_an_error() {
        let mock = MockConnection::new();
        mock.expect_exec("DROP SCHEMA [a]").will_return_result(1);

        let err = mock.exec("DROP SCHEMA [b]", &[]).await.unwrap_err();
        assert!(err.to_string().contains("DROP SCHEMA [a]"));
    }

    #[tokio::test]
    async fn mismatched_args_are_an_error() {
        let mock = MockConnection::new();
        mock.expect_query("SELECT SCHEMA_ID(@p1)")
            .with_args(values!["a"])
            .will_return_rows(vec![]);

        assert!(mock.query("SELECT SCHEMA_ID(@p1)", &values!["b"]).await.is_err());
    }

    #[tokio::test]
    async fn errors_are_returned_verbatim() {
        let mock = MockConnection::new();
        mock.expect_exec("DROP SCHEMA [a]")
            .will_return_error("Cannot drop schema 'a', because it does not exist.");

        let err = mock.exec("DROP SCHEMA [a]", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot drop schema 'a', because it does not exist.");
    }

    #[tokio::test]
    #[should_panic(expected = "unmet SQL expectations")]
    async fn verify_reports_pending_expectations() {
        let mock = MockConnection::new();
        mock.expect_exec("DROP SCHEMA [a]").will_return_result(1);
        mock.verify();
    }

    #[tokio::test]
    async fn database_connections_share_the_queue() {
        let mock = MockConnection::new();
        mock.expect_exec("DROP USER [u]").will_return_result(1);

        let db = mock.for_database("sales").await.unwrap();
        db.exec("DROP USER [u]", &[]).await.unwrap();

        assert_eq!(mock.opened_databases(), vec!["sales".to_string()]);
        mock.verify();
    }
}
