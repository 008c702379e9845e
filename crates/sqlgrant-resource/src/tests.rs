use sqlgrant_sql::mock::MockConnection;
use sqlgrant_sql::values;

/// Per-test mock plus the catalog lookups most adapters start with.
pub(crate) struct Fixture {
    pub mock: MockConnection,
}

impl Fixture {
    pub fn new() -> Self {
        Self { mock: MockConnection::new() }
    }

    /// Opening a database-scoped connection resolves the database, then its name.
    pub fn expect_database(&self, id: i32, name: &str) {
        for _ in 0..2 {
            self.mock
                .expect_query("SELECT DB_NAME(@p1)")
                .with_args(values![id])
                .will_return_rows(vec![values![name]]);
        }
    }

    pub fn expect_principal_type(&self, id: i32, code: &str) {
        self.mock
            .expect_query("SELECT [type] FROM sys.database_principals WHERE [principal_id] = @p1")
            .with_args(values![id])
            .will_return_rows(vec![values![code]]);
    }

    pub fn expect_user_name(&self, id: i32, name: &str) {
        self.mock
            .expect_query("SELECT USER_NAME(@p1)")
            .with_args(values![id])
            .will_return_rows(vec![values![name]]);
    }

    pub fn expect_server_principal_type(&self, id: i32, code: &str) {
        self.mock
            .expect_query("SELECT [type] FROM sys.server_principals WHERE [principal_id] = @p1")
            .with_args(values![id])
            .will_return_rows(vec![values![code]]);
    }

    pub fn expect_server_principal_name(&self, id: i32, name: &str) {
        self.mock
            .expect_query("SELECT [name] FROM sys.server_principals WHERE [principal_id] = @p1")
            .with_args(values![id])
            .will_return_rows(vec![values![name]]);
    }
}
