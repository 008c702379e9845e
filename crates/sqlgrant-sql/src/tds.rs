//! SQL Server connection over TDS, backed by tiberius.

use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Query};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::connection::Connection;
use crate::error::SqlError;
use crate::value::{Row, SqlValue};

type TdsClient = Client<Compat<TcpStream>>;

#[derive(Debug, Clone)]
pub enum TdsAuth {
    SqlServer { username: String, password: String },
    AadToken(String),
}

#[derive(Debug, Clone)]
pub struct TdsConfig {
    pub host: String,
    pub port: u16,
    /// Initial database; `None` connects to the login's default database.
    pub database: Option<String>,
    pub auth: TdsAuth,
    pub trust_cert: bool,
    /// Deadline for each statement; expiry surfaces as [`SqlError::Cancelled`].
    pub statement_timeout: Option<Duration>,
}

impl TdsConfig {
    fn to_tiberius(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.application_name("sqlgrant");
        match &self.auth {
            TdsAuth::SqlServer { username, password } => {
                config.authentication(AuthMethod::sql_server(username, password));
            }
            TdsAuth::AadToken(token) => {
                config.authentication(AuthMethod::aad_token(token));
            }
        }
        if let Some(db) = &self.database {
            config.database(db);
        }
        config.encryption(EncryptionLevel::Required);
        if self.trust_cert {
            config.trust_cert();
        }
        config
    }
}

impl From<tiberius::error::Error> for SqlError {
    fn from(e: tiberius::error::Error) -> Self {
        match e {
            tiberius::error::Error::Io { .. } | tiberius::error::Error::Tls(_) => {
                SqlError::Connection(e.to_string())
            }
            other => SqlError::Execution(other.to_string()),
        }
    }
}

/// A single TDS session. Statements are serialized through a mutex; open
/// more connections for parallel work.
pub struct TdsConnection {
    config: TdsConfig,
    client: Mutex<TdsClient>,
}

impl TdsConnection {
    pub async fn connect(config: TdsConfig) -> Result<Self, SqlError> {
        let tib_config = config.to_tiberius();
        let tcp = TcpStream::connect(tib_config.get_addr())
            .await
            .map_err(|e| {
                SqlError::Connection(format!(
                    "failed to connect to {}:{} - {}",
                    config.host, config.port, e
                ))
            })?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(tib_config, tcp.compat_write()).await?;
        debug!(
            "Connected to {}:{} (database: {})",
            config.host,
            config.port,
            config.database.as_deref().unwrap_or("<default>")
        );
        Ok(Self { config, client: Mutex::new(client) })
    }

    async fn with_deadline<T, F>(&self, fut: F) -> Result<T, SqlError>
    where
        F: std::future::Future<Output = Result<T, SqlError>>,
    {
        match self.config.statement_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| SqlError::Cancelled(format!("statement exceeded {limit:?}")))?,
            None => fut.await,
        }
    }

    fn prepare<'a>(query: &str, args: &'a [SqlValue]) -> Query<'a> {
        let mut q = Query::new(native_placeholders(query));
        for arg in args {
            match arg {
                SqlValue::Null => q.bind(Option::<i32>::None),
                SqlValue::Int(v) => match i32::try_from(*v) {
                    Ok(small) => q.bind(small),
                    Err(_) => q.bind(*v),
                },
                SqlValue::Text(s) => q.bind(s.as_str()),
                SqlValue::Bool(b) => q.bind(*b),
                SqlValue::Bytes(b) => q.bind(b.as_slice()),
            }
        }
        q
    }
}

#[async_trait]
impl Connection for TdsConnection {
    async fn exec(&self, query: &str, args: &[SqlValue]) -> Result<u64, SqlError> {
        debug!("exec: {query}");
        self.with_deadline(async {
            let mut client = self.client.lock().await;
            let result = Self::prepare(query, args).execute(&mut *client).await?;
            Ok(result.total())
        })
        .await
    }

    async fn query(&self, query: &str, args: &[SqlValue]) -> Result<Vec<Row>, SqlError> {
        debug!("query: {query}");
        self.with_deadline(async {
            let mut client = self.client.lock().await;
            let stream = Self::prepare(query, args).query(&mut *client).await?;
            let rows = stream.into_first_result().await?;
            Ok(rows.iter().map(convert_row).collect())
        })
        .await
    }

    async fn for_database(&self, name: &str) -> Result<Arc<dyn Connection>, SqlError> {
        let mut config = self.config.clone();
        config.database = Some(name.to_string());
        Ok(Arc::new(TdsConnection::connect(config).await?))
    }
}

/// Rewrite `@p1`-style placeholders to the `@P1` names tiberius declares.
/// Text inside `[...]` identifiers and `'...'` literals is left untouched.
fn native_placeholders(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '[' => copy_quoted(&mut chars, &mut out, ']'),
            '\'' => copy_quoted(&mut chars, &mut out, '\''),
            '@' if chars.peek() == Some(&'p') => {
                chars.next();
                if chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                    out.push('P');
                } else {
                    out.push('p');
                }
            }
            _ => {}
        }
    }
    out
}

/// Copy up to and including the closing `close`; a doubled `close` is an
/// escaped character and does not end the quoted run.
fn copy_quoted(chars: &mut Peekable<Chars<'_>>, out: &mut String, close: char) {
    while let Some(c) = chars.next() {
        out.push(c);
        if c == close {
            if chars.peek() == Some(&close) {
                chars.next();
                out.push(close);
            } else {
                return;
            }
        }
    }
}

fn convert_cell(data: &ColumnData<'_>) -> SqlValue {
    match data {
        ColumnData::Bit(Some(b)) => SqlValue::Bool(*b),
        ColumnData::U8(Some(v)) => SqlValue::Int(i64::from(*v)),
        ColumnData::I16(Some(v)) => SqlValue::Int(i64::from(*v)),
        ColumnData::I32(Some(v)) => SqlValue::Int(i64::from(*v)),
        ColumnData::I64(Some(v)) => SqlValue::Int(*v),
        ColumnData::String(Some(s)) => SqlValue::Text(s.to_string()),
        ColumnData::Guid(Some(g)) => SqlValue::Text(g.to_string().to_uppercase()),
        ColumnData::Binary(Some(b)) => SqlValue::Bytes(b.to_vec()),
        _ => SqlValue::Null,
    }
}

fn convert_row(row: &tiberius::Row) -> Row {
    Row::new(row.cells().map(|(_, data)| convert_cell(data)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_upper_cased() {
        assert_eq!(
            native_placeholders("SELECT [x] FROM t WHERE a = @p1 AND b = @p12"),
            "SELECT [x] FROM t WHERE a = @P1 AND b = @P12"
        );
    }

    #[test]
    fn other_variables_are_left_alone() {
        assert_eq!(
            native_placeholders("DECLARE @SQL NVARCHAR(MAX) = @p1; EXEC(@SQL); SET @param = 1"),
            "DECLARE @SQL NVARCHAR(MAX) = @P1; EXEC(@SQL); SET @param = 1"
        );
    }

    #[test]
    fn bracketed_identifiers_are_left_alone() {
        assert_eq!(
            native_placeholders("CREATE SCHEMA [team@p1] AUTHORIZATION [self]"),
            "CREATE SCHEMA [team@p1] AUTHORIZATION [self]"
        );
        assert_eq!(
            native_placeholders("ALTER ROLE [a]]@p1] WITH NAME = [b@p2]; SELECT @p1"),
            "ALTER ROLE [a]]@p1] WITH NAME = [b@p2]; SELECT @P1"
        );
    }

    #[test]
    fn string_literals_are_left_alone() {
        assert_eq!(
            native_placeholders("SELECT N'it''s @p1', @p1"),
            "SELECT N'it''s @p1', @P1"
        );
        assert_eq!(
            native_placeholders("DECLARE @SQL NVARCHAR(MAX) = 'CREATE USER ' + QUOTENAME(@p1) + ', TYPE=E'"),
            "DECLARE @SQL NVARCHAR(MAX) = 'CREATE USER ' + QUOTENAME(@P1) + ', TYPE=E'"
        );
    }

    #[test]
    fn null_cells_become_null() {
        assert_eq!(convert_cell(&ColumnData::I32(None)), SqlValue::Null);
        assert_eq!(convert_cell(&ColumnData::I32(Some(7))), SqlValue::Int(7));
    }
}
