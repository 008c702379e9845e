use async_trait::async_trait;
use sqlgrant_domain::{DatabasePrincipalId, DatabaseScoped, SchemaData, SchemaId, SchemaSettings};
use sqlgrant_sql::{Connection, Entity, Owned, Schema};
use tracing::info;

use crate::error::ResourceError;
use crate::resource::{confirm_owner, database_conn, parse_id, Resource, Response};

pub struct SchemaResource;

fn to_settings(data: &SchemaData) -> SchemaSettings {
    SchemaSettings {
        name: data.name.clone(),
        owner_id: data.owner_id.unwrap_or(DatabasePrincipalId::EMPTY),
    }
}

fn with_settings(data: &SchemaData, settings: SchemaSettings) -> SchemaData {
    SchemaData { name: settings.name, owner_id: Some(settings.owner_id), ..data.clone() }
}

#[async_trait]
impl Resource for SchemaResource {
    type Data = SchemaData;

    const KIND: &'static str = "schema";
    // Schemas cannot be renamed in place.
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["database_id", "name"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &SchemaData,
        resp: &mut Response<SchemaData>,
    ) -> Result<(), ResourceError> {
        let id: DatabaseScoped<SchemaId> = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let schema = Schema::get(db.as_ref(), id.object_id).await?;
        let settings = schema.settings().await?;
        resp.set_state(SchemaData { database_id: id.database_id, ..with_settings(state, settings) });
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &SchemaData,
        resp: &mut Response<SchemaData>,
    ) -> Result<(), ResourceError> {
        let db = database_conn(conn, plan.database_id).await?;
        let schema = Schema::create(db.as_ref(), &to_settings(plan)).await?;
        info!("Created schema {} in database {}", plan.name, plan.database_id);
        let mut state = with_settings(plan, schema.settings().await?);
        state.id = Some(DatabaseScoped::new(plan.database_id, schema.id()).to_string());
        resp.set_state(state);
        Ok(())
    }

    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &SchemaData,
        resp: &mut Response<SchemaData>,
    ) -> Result<(), ResourceError> {
        let id: DatabaseScoped<SchemaId> = parse_id(plan.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let schema = Schema::get(db.as_ref(), id.object_id).await?;
        if let Some(owner) = plan.owner_id {
            schema.change_owner(owner).await?;
        }
        let state = with_settings(plan, schema.settings().await?);
        resp.set_state(state.clone());
        confirm_owner(Self::KIND, plan.owner_id, state.owner_id)
    }

    async fn delete(&self, conn: &dyn Connection, state: &SchemaData) -> Result<(), ResourceError> {
        let id: DatabaseScoped<SchemaId> = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        Schema::get(db.as_ref(), id.object_id).await?.drop().await?;
        info!("Dropped schema {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Fixture;
    use sqlgrant_domain::DatabaseId;
    use sqlgrant_sql::values;

    const SETTINGS: &str = "SELECT [name], [principal_id] FROM sys.schemas WHERE [schema_id] = @p1";

    fn plan() -> SchemaData {
        SchemaData {
            id: None,
            database_id: DatabaseId(7),
            name: "sales".into(),
            owner_id: None,
        }
    }

    #[tokio::test]
    async fn create_reads_back_owner_and_sets_id() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.mock
            .expect_exec("CREATE SCHEMA [sales] AUTHORIZATION [self]")
            .will_return_result(0);
        f.mock
            .expect_query("SELECT SCHEMA_ID(@p1)")
            .with_args(values!["sales"])
            .will_return_rows(vec![values![9]]);
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![9])
            .will_return_rows(vec![values!["sales", 1]]);

        let mut resp = Response::new();
        SchemaResource.create(&f.mock, &plan(), &mut resp).await.unwrap();

        let state = resp.into_state().unwrap();
        assert_eq!(state.id.as_deref(), Some("7/9"));
        assert_eq!(state.owner_id, Some(DatabasePrincipalId(1)));
        assert_eq!(f.mock.opened_databases(), vec!["db".to_string()]);
        f.mock.verify();
    }

    #[tokio::test]
    async fn failed_create_leaves_no_state() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.mock
            .expect_exec("CREATE SCHEMA [sales] AUTHORIZATION [self]")
            .will_return_error("There is already an object named 'sales' in the database.");

        let mut resp = Response::new();
        let err = SchemaResource.create(&f.mock, &plan(), &mut resp).await.unwrap_err();

        assert!(resp.state.is_none());
        assert_eq!(err.kind(), crate::ErrorKind::SqlExecution);
        f.mock.verify();
    }

    #[tokio::test]
    async fn read_of_dropped_schema_is_not_found() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.mock
            .expect_query("SELECT SCHEMA_NAME(@p1)")
            .with_args(values![9])
            .will_return_rows(vec![values![Option::<String>::None]]);

        let state = SchemaData { id: Some("7/9".into()), ..plan() };
        let err = SchemaResource.read(&f.mock, &state, &mut Response::new()).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_changes_owner() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.mock
            .expect_query("SELECT SCHEMA_NAME(@p1)")
            .with_args(values![9])
            .will_return_rows(vec![values!["sales"]]);
        f.mock
            .expect_query("SELECT SCHEMA_NAME(@p1)")
            .with_args(values![9])
            .will_return_rows(vec![values!["sales"]]);
        f.mock
            .expect_query("SELECT USER_NAME(@p1)")
            .with_args(values![5])
            .will_return_rows(vec![values!["boss"]]);
        f.mock
            .expect_exec("ALTER AUTHORIZATION ON schema::[sales] TO [boss]")
            .will_return_result(0);
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![9])
            .will_return_rows(vec![values!["sales", 5]]);

        let plan = SchemaData {
            id: Some("7/9".into()),
            owner_id: Some(DatabasePrincipalId(5)),
            ..plan()
        };
        let mut resp = Response::new();
        SchemaResource.update(&f.mock, &plan, &mut resp).await.unwrap();

        assert_eq!(resp.state.unwrap().owner_id, Some(DatabasePrincipalId(5)));
        f.mock.verify();
    }

    #[tokio::test]
    async fn owner_change_missing_from_read_back_is_an_error() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.mock
            .expect_query("SELECT SCHEMA_NAME(@p1)")
            .with_args(values![9])
            .will_return_rows(vec![values!["sales"]]);
        f.mock
            .expect_query("SELECT SCHEMA_NAME(@p1)")
            .with_args(values![9])
            .will_return_rows(vec![values!["sales"]]);
        f.mock
            .expect_query("SELECT USER_NAME(@p1)")
            .with_args(values![5])
            .will_return_rows(vec![values!["boss"]]);
        f.mock
            .expect_exec("ALTER AUTHORIZATION ON schema::[sales] TO [boss]")
            .will_return_result(0);
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![9])
            .will_return_rows(vec![values!["sales", 1]]);

        let plan = SchemaData {
            id: Some("7/9".into()),
            owner_id: Some(DatabasePrincipalId(5)),
            ..plan()
        };
        let mut resp = Response::new();
        let err = SchemaResource.update(&f.mock, &plan, &mut resp).await.unwrap_err();

        assert!(matches!(err, ResourceError::NotApplied { field: "owner_id", .. }), "{err}");
        assert_eq!(err.kind(), crate::ErrorKind::SqlExecution);
        assert_eq!(resp.state.unwrap().owner_id, Some(DatabasePrincipalId(1)));
        f.mock.verify();
    }
}
