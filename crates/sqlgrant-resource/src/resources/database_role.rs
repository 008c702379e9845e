use async_trait::async_trait;
use sqlgrant_domain::{
    DatabasePrincipalId, DatabaseRoleData, DatabaseRoleId, DatabaseRoleSettings, DatabaseScoped,
};
use sqlgrant_sql::{Connection, DatabaseRole, Entity, Owned, Renameable};
use tracing::info;

use crate::error::ResourceError;
use crate::resource::{confirm, confirm_owner, database_conn, parse_id, Resource, Response};

pub struct DatabaseRoleResource;

fn to_settings(data: &DatabaseRoleData) -> DatabaseRoleSettings {
    DatabaseRoleSettings {
        name: data.name.clone(),
        owner_id: data.owner_id.unwrap_or(DatabasePrincipalId::EMPTY),
    }
}

fn with_settings(data: &DatabaseRoleData, settings: DatabaseRoleSettings) -> DatabaseRoleData {
    DatabaseRoleData { name: settings.name, owner_id: Some(settings.owner_id), ..data.clone() }
}

#[async_trait]
impl Resource for DatabaseRoleResource {
    type Data = DatabaseRoleData;

    const KIND: &'static str = "database_role";
    const REPLACE_ON_CHANGE: &'static [&'static str] = &["database_id"];

    async fn read(
        &self,
        conn: &dyn Connection,
        state: &DatabaseRoleData,
        resp: &mut Response<DatabaseRoleData>,
    ) -> Result<(), ResourceError> {
        let id: DatabaseScoped<DatabaseRoleId> = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let role = DatabaseRole::get(db.as_ref(), id.object_id).await?;
        let settings = role.settings().await?;
        resp.set_state(DatabaseRoleData { database_id: id.database_id, ..with_settings(state, settings) });
        Ok(())
    }

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &DatabaseRoleData,
        resp: &mut Response<DatabaseRoleData>,
    ) -> Result<(), ResourceError> {
        let db = database_conn(conn, plan.database_id).await?;
        let role = DatabaseRole::create(db.as_ref(), &to_settings(plan)).await?;
        info!("Created database role {} in database {}", plan.name, plan.database_id);
        let mut state = with_settings(plan, role.settings().await?);
        state.id = Some(DatabaseScoped::new(plan.database_id, role.id()).to_string());
        resp.set_state(state);
        Ok(())
    }

    /// Rename first, then owner. The two statements are not atomic; state
    /// is read back after each, so a failed owner change still reports the
    /// rename.
    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &DatabaseRoleData,
        resp: &mut Response<DatabaseRoleData>,
    ) -> Result<(), ResourceError> {
        let id: DatabaseScoped<DatabaseRoleId> = parse_id(plan.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        let role = DatabaseRole::get(db.as_ref(), id.object_id).await?;
        role.rename(&plan.name).await?;
        let mut state = with_settings(plan, role.settings().await?);
        resp.set_state(state.clone());
        confirm(Self::KIND, "name", &plan.name, &state.name)?;

        if let Some(owner) = plan.owner_id {
            if state.owner_id != Some(owner) {
                role.change_owner(owner).await?;
                state = with_settings(plan, role.settings().await?);
                resp.set_state(state.clone());
            }
        }
        confirm_owner(Self::KIND, plan.owner_id, state.owner_id)
    }

    async fn delete(&self, conn: &dyn Connection, state: &DatabaseRoleData) -> Result<(), ResourceError> {
        let id: DatabaseScoped<DatabaseRoleId> = parse_id(state.id.as_deref(), Self::KIND)?;
        let db = database_conn(conn, id.database_id).await?;
        DatabaseRole::get(db.as_ref(), id.object_id).await?.drop().await?;
        info!("Dropped database role {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Fixture;
    use sqlgrant_domain::DatabaseId;
    use sqlgrant_sql::values;

    const SETTINGS: &str = "SELECT [name], [owning_principal_id] FROM sys.database_principals WHERE [principal_id] = @p1 AND [type] = 'R'";

    fn state() -> DatabaseRoleData {
        DatabaseRoleData {
            id: Some("7/12".into()),
            database_id: DatabaseId(7),
            name: "readers".into(),
            owner_id: Some(DatabasePrincipalId(1)),
        }
    }

    #[tokio::test]
    async fn read_overwrites_local_state() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.expect_principal_type(12, "R");
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![12])
            .will_return_rows(vec![values!["renamed_elsewhere", 1]]);

        let mut resp = Response::new();
        DatabaseRoleResource.read(&f.mock, &state(), &mut resp).await.unwrap();

        assert_eq!(resp.state.unwrap().name, "renamed_elsewhere");
        f.mock.verify();
    }

    #[tokio::test]
    async fn failed_owner_change_keeps_the_rename() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.expect_principal_type(12, "R");
        f.expect_user_name(12, "readers");
        f.mock
            .expect_exec("ALTER ROLE [readers] WITH NAME = [viewers]")
            .will_return_result(0);
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![12])
            .will_return_rows(vec![values!["viewers", 1]]);
        f.expect_user_name(12, "viewers");
        f.expect_user_name(4, "boss");
        f.mock
            .expect_exec("ALTER AUTHORIZATION ON ROLE::[viewers] TO [boss]")
            .will_return_error("Cannot find the user 'boss'.");

        let plan = DatabaseRoleData {
            name: "viewers".into(),
            owner_id: Some(DatabasePrincipalId(4)),
            ..state()
        };
        let mut resp = Response::new();
        let err = DatabaseRoleResource.update(&f.mock, &plan, &mut resp).await.unwrap_err();

        assert_eq!(err.to_string(), "Cannot find the user 'boss'.");
        let state = resp.state.unwrap();
        assert_eq!(state.name, "viewers");
        assert_eq!(state.owner_id, Some(DatabasePrincipalId(1)));
        f.mock.verify();
    }

    #[tokio::test]
    async fn rename_missing_from_read_back_stops_before_owner_change() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.expect_principal_type(12, "R");
        f.expect_user_name(12, "readers");
        f.mock
            .expect_exec("ALTER ROLE [readers] WITH NAME = [viewers]")
            .will_return_result(0);
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![12])
            .will_return_rows(vec![values!["readers", 1]]);

        let plan = DatabaseRoleData {
            name: "viewers".into(),
            owner_id: Some(DatabasePrincipalId(4)),
            ..state()
        };
        let mut resp = Response::new();
        let err = DatabaseRoleResource.update(&f.mock, &plan, &mut resp).await.unwrap_err();

        assert!(matches!(err, ResourceError::NotApplied { field: "name", .. }), "{err}");
        assert_eq!(resp.state.unwrap().name, "readers");
        f.mock.verify();
    }

    #[tokio::test]
    async fn owner_change_missing_from_read_back_is_an_error() {
        let f = Fixture::new();
        f.expect_database(7, "db");
        f.expect_principal_type(12, "R");
        f.expect_user_name(12, "readers");
        f.mock
            .expect_exec("ALTER ROLE [readers] WITH NAME = [readers]")
            .will_return_result(0);
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![12])
            .will_return_rows(vec![values!["readers", 1]]);
        f.expect_user_name(12, "readers");
        f.expect_user_name(4, "boss");
        f.mock
            .expect_exec("ALTER AUTHORIZATION ON ROLE::[readers] TO [boss]")
            .will_return_result(0);
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![12])
            .will_return_rows(vec![values!["readers", 1]]);

        let plan = DatabaseRoleData { owner_id: Some(DatabasePrincipalId(4)), ..state() };
        let mut resp = Response::new();
        let err = DatabaseRoleResource.update(&f.mock, &plan, &mut resp).await.unwrap_err();

        assert!(matches!(err, ResourceError::NotApplied { field: "owner_id", .. }), "{err}");
        assert_eq!(resp.state.unwrap().owner_id, Some(DatabasePrincipalId(1)));
        f.mock.verify();
    }
}
