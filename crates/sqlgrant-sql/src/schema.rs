use async_trait::async_trait;
use sqlgrant_domain::{validate_name, DatabasePrincipalId, SchemaId, SchemaSettings};
use tracing::debug;

use crate::connection::{scalar_i32, scalar_string, Connection};
use crate::entity::{Entity, Owned};
use crate::error::SqlError;
use crate::quote::quote_ident;
use crate::values;

#[derive(Clone, Copy)]
pub struct Schema<'c> {
    conn: &'c dyn Connection,
    id: SchemaId,
}

impl<'c> Schema<'c> {
    pub async fn get(conn: &'c dyn Connection, id: SchemaId) -> Result<Schema<'c>, SqlError> {
        let schema = Schema { conn, id };
        schema.name().await?;
        Ok(schema)
    }

    pub async fn get_by_name(conn: &'c dyn Connection, name: &str) -> Result<Schema<'c>, SqlError> {
        let id = scalar_i32(conn, "SELECT SCHEMA_ID(@p1)", &values![name])
            .await?
            .ok_or_else(|| SqlError::not_found("schema", name))?;
        Ok(Schema { conn, id: SchemaId(id) })
    }

    /// Create the schema, then resolve its id by name. Two concurrent
    /// creations of the same name both resolve to whichever object the
    /// catalog returns.
    pub async fn create(
        conn: &'c dyn Connection,
        settings: &SchemaSettings,
    ) -> Result<Schema<'c>, SqlError> {
        validate_name(&settings.name)?;
        let owner = conn.get_user_name(settings.owner_id).await?;
        conn.exec(
            &format!(
                "CREATE SCHEMA {} AUTHORIZATION {}",
                quote_ident(&settings.name),
                quote_ident(&owner)
            ),
            &[],
        )
        .await?;
        debug!("Created schema {}", settings.name);
        Self::get_by_name(conn, &settings.name).await
    }
}

#[async_trait]
impl<'c> Entity for Schema<'c> {
    type Id = SchemaId;
    type Settings = SchemaSettings;

    fn id(&self) -> SchemaId {
        self.id
    }

    async fn name(&self) -> Result<String, SqlError> {
        scalar_string(self.conn, "SELECT SCHEMA_NAME(@p1)", &values![self.id])
            .await?
            .ok_or_else(|| SqlError::not_found("schema", self.id))
    }

    async fn settings(&self) -> Result<SchemaSettings, SqlError> {
        let row = self
            .conn
            .query_row(
                "SELECT [name], [principal_id] FROM sys.schemas WHERE [schema_id] = @p1",
                &values![self.id],
            )
            .await?
            .ok_or_else(|| SqlError::not_found("schema", self.id))?;
        Ok(SchemaSettings {
            name: row.string(0)?,
            owner_id: DatabasePrincipalId(row.i32(1)?),
        })
    }

    async fn drop(&self) -> Result<(), SqlError> {
        let name = self.name().await?;
        self.conn
            .exec(&format!("DROP SCHEMA {}", quote_ident(&name)), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<'c> Owned for Schema<'c> {
    type OwnerId = DatabasePrincipalId;

    async fn owner_id(&self) -> Result<DatabasePrincipalId, SqlError> {
        scalar_i32(
            self.conn,
            "SELECT [principal_id] FROM sys.schemas WHERE [schema_id] = @p1",
            &values![self.id],
        )
        .await?
        .map(DatabasePrincipalId)
        .ok_or_else(|| SqlError::not_found("schema", self.id))
    }

    async fn change_owner(&self, owner: DatabasePrincipalId) -> Result<(), SqlError> {
        let name = self.name().await?;
        let owner_name = self.conn.get_user_name(owner).await?;
        self.conn
            .exec(
                &format!(
                    "ALTER AUTHORIZATION ON schema::{} TO {}",
                    quote_ident(&name),
                    quote_ident(&owner_name)
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

    struct Fixture {
        mock: MockConnection,
    }

    impl Fixture {
        fn new() -> Self {
            Self { mock: MockConnection::new() }
        }

        fn expect_schema_id_query(&self, name: &str, id: i32) {
            self.mock
                .expect_query("SELECT SCHEMA_ID(@p1)")
                .with_args(values![name])
                .will_return_rows(vec![values![id]]);
        }

        fn expect_schema_name_query(&self, name: &str, id: i32) {
            self.mock
                .expect_query("SELECT SCHEMA_NAME(@p1)")
                .with_args(values![id])
                .will_return_rows(vec![values![name]]);
        }

        fn expect_user_name_query(&self, id: i32, name: &str) {
            self.mock
                .expect_query("SELECT USER_NAME(@p1)")
                .with_args(values![id])
                .will_return_rows(vec![values![name]]);
        }

        async fn schema(&self, id: i32) -> Schema<'_> {
            self.expect_schema_name_query("existing", id);
            Schema::get(&self.mock, SchemaId(id)).await.unwrap()
        }
    }

    #[tokio::test]
    async fn get_schema_by_name() {
        let f = Fixture::new();
        f.expect_schema_id_query("test_schema", 235);

        let sch = Schema::get_by_name(&f.mock, "test_schema").await.unwrap();

        assert_eq!(sch.id(), SchemaId(235));
        f.mock.verify();
    }

    #[tokio::test]
    async fn get_schema_by_unknown_name_is_not_found() {
        let f = Fixture::new();
        f.mock
            .expect_query("SELECT SCHEMA_ID(@p1)")
            .with_args(values!["missing"])
            .will_return_rows(vec![values![Option::<i32>::None]]);

        let err = Schema::get_by_name(&f.mock, "missing").await.err().unwrap();

        assert!(matches!(err, SqlError::NotFound { .. }));
    }

    #[tokio::test]
    async fn get_schema_keeps_the_requested_id() {
        let f = Fixture::new();
        let sch = f.schema(322).await;
        assert_eq!(sch.id(), SchemaId(322));
        f.mock.verify();
    }

    #[tokio::test]
    async fn get_unknown_schema_id_is_not_found() {
        let f = Fixture::new();
        f.mock
            .expect_query("SELECT SCHEMA_NAME(@p1)")
            .with_args(values![9])
            .will_return_rows(vec![]);

        assert!(matches!(
            Schema::get(&f.mock, SchemaId(9)).await,
            Err(SqlError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn create_schema_with_default_owner() {
        let f = Fixture::new();
        f.mock
            .expect_exec("CREATE SCHEMA [test_schema] AUTHORIZATION [self]")
            .will_return_result(1);
        f.expect_schema_id_query("test_schema", 13);

        let settings = SchemaSettings {
            name: "test_schema".into(),
            owner_id: DatabasePrincipalId::EMPTY,
        };
        let sch = Schema::create(&f.mock, &settings).await.unwrap();

        assert_eq!(sch.id(), SchemaId(13));
        f.mock.verify();
    }

    #[tokio::test]
    async fn create_schema_with_owner() {
        let f = Fixture::new();
        f.expect_user_name_query(634, "test_owner");
        f.mock
            .expect_exec("CREATE SCHEMA [test_schema_with_owner] AUTHORIZATION [test_owner]")
            .will_return_result(1);
        f.expect_schema_id_query("test_schema_with_owner", 24);

        let settings = SchemaSettings {
            name: "test_schema_with_owner".into(),
            owner_id: DatabasePrincipalId(634),
        };
        let sch = Schema::create(&f.mock, &settings).await.unwrap();

        assert_eq!(sch.id(), SchemaId(24));
        f.mock.verify();
    }

    #[tokio::test]
    async fn create_schema_escapes_brackets() {
        let f = Fixture::new();
        f.mock
            .expect_exec("CREATE SCHEMA [odd]]name] AUTHORIZATION [self]")
            .will_return_result(1);
        f.expect_schema_id_query("odd]name", 30);

        let settings = SchemaSettings {
            name: "odd]name".into(),
            owner_id: DatabasePrincipalId::EMPTY,
        };
        Schema::create(&f.mock, &settings).await.unwrap();
        f.mock.verify();
    }

    #[tokio::test]
    async fn failed_create_skips_id_lookup() {
        let f = Fixture::new();
        f.mock
            .expect_exec("CREATE SCHEMA [dup] AUTHORIZATION [self]")
            .will_return_error("There is already an object named 'dup' in the database.");

        let settings = SchemaSettings { name: "dup".into(), owner_id: DatabasePrincipalId::EMPTY };
        let err = Schema::create(&f.mock, &settings).await.err().unwrap();

        assert_eq!(err.to_string(), "There is already an object named 'dup' in the database.");
        f.mock.verify();
    }

    #[tokio::test]
    async fn get_owner_id() {
        let f = Fixture::new();
        let sch = f.schema(322).await;
        f.mock
            .expect_query("SELECT [principal_id] FROM sys.schemas WHERE [schema_id] = @p1")
            .with_args(values![322])
            .will_return_rows(vec![values![425]]);

        assert_eq!(sch.owner_id().await.unwrap(), DatabasePrincipalId(425));
        f.mock.verify();
    }

    #[tokio::test]
    async fn settings_read_name_and_owner() {
        let f = Fixture::new();
        let sch = f.schema(322).await;
        f.mock
            .expect_query("SELECT [name], [principal_id] FROM sys.schemas WHERE [schema_id] = @p1")
            .with_args(values![322])
            .will_return_rows(vec![values!["sales", 5]]);

        let settings = sch.settings().await.unwrap();

        assert_eq!(
            settings,
            SchemaSettings { name: "sales".into(), owner_id: DatabasePrincipalId(5) }
        );
        f.mock.verify();
    }

    #[tokio::test]
    async fn change_owner() {
        let f = Fixture::new();
        let sch = f.schema(322).await;
        f.expect_schema_name_query("test_schema_chown", 322);
        f.expect_user_name_query(23, "new_owner");
        f.mock
            .expect_exec("ALTER AUTHORIZATION ON schema::[test_schema_chown] TO [new_owner]")
            .will_return_result(1);

        sch.change_owner(DatabasePrincipalId(23)).await.unwrap();
        f.mock.verify();
    }

    #[tokio::test]
    async fn change_owner_to_current() {
        let f = Fixture::new();
        let sch = f.schema(322).await;
        f.expect_schema_name_query("test_schema_chown", 322);
        f.mock
            .expect_exec("ALTER AUTHORIZATION ON schema::[test_schema_chown] TO [self]")
            .will_return_result(1);

        sch.change_owner(DatabasePrincipalId::EMPTY).await.unwrap();
        f.mock.verify();
    }

    #[tokio::test]
    async fn drop_schema() {
        let f = Fixture::new();
        let sch = f.schema(322).await;
        f.expect_schema_name_query("to_be_dropped", 322);
        f.mock.expect_exec("DROP SCHEMA [to_be_dropped]").will_return_result(1);

        sch.drop().await.unwrap();
        f.mock.verify();
    }

    #[tokio::test]
    async fn drop_of_vanished_schema_is_not_found() {
        let f = Fixture::new();
        let sch = f.schema(322).await;
        f.mock
            .expect_query("SELECT SCHEMA_NAME(@p1)")
            .with_args(values![322])
            .will_return_rows(vec![values![Option::<String>::None]]);

        assert!(matches!(sch.drop().await, Err(SqlError::NotFound { .. })));
        f.mock.verify();
    }
}
