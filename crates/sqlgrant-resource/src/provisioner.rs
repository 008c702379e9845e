//! Dispatch over the closed set of resource kinds, and the create / update /
//! replace decision behind `apply`.

use std::fmt;

use serde_json::Value;
use sqlgrant_domain::ResourceModel;
use sqlgrant_sql::Connection;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, ProvisionError, ResourceError};
use crate::report::{Action, ApplyReport, Change};
use crate::resource::{Resource, Response};
use crate::resources::{
    AzureAdServicePrincipalResource, AzureAdUserResource, DatabasePermissionResource,
    DatabaseResource, DatabaseRoleMemberResource, DatabaseRoleResource, SchemaPermissionResource,
    SchemaResource, ServerRoleMemberResource, ServerRoleResource, SqlLoginResource, SqlUserResource,
};

/// Bind the adapter, the inner data and the variant constructor for `$model`.
macro_rules! with_resource {
    ($model:expr, |$res:ident, $data:ident, $wrap:ident| $body:expr) => {
        match $model {
            ResourceModel::Database($data) => {
                let ($res, $wrap) = (DatabaseResource, ResourceModel::Database);
                $body
            }
            ResourceModel::Schema($data) => {
                let ($res, $wrap) = (SchemaResource, ResourceModel::Schema);
                $body
            }
            ResourceModel::DatabaseRole($data) => {
                let ($res, $wrap) = (DatabaseRoleResource, ResourceModel::DatabaseRole);
                $body
            }
            ResourceModel::DatabaseRoleMember($data) => {
                let ($res, $wrap) = (DatabaseRoleMemberResource, ResourceModel::DatabaseRoleMember);
                $body
            }
            ResourceModel::SqlUser($data) => {
                let ($res, $wrap) = (SqlUserResource, ResourceModel::SqlUser);
                $body
            }
            ResourceModel::AzureadUser($data) => {
                let ($res, $wrap) = (AzureAdUserResource, ResourceModel::AzureadUser);
                $body
            }
            ResourceModel::AzureadServicePrincipal($data) => {
                let ($res, $wrap) =
                    (AzureAdServicePrincipalResource, ResourceModel::AzureadServicePrincipal);
                $body
            }
            ResourceModel::ServerRole($data) => {
                let ($res, $wrap) = (ServerRoleResource, ResourceModel::ServerRole);
                $body
            }
            ResourceModel::ServerRoleMember($data) => {
                let ($res, $wrap) = (ServerRoleMemberResource, ResourceModel::ServerRoleMember);
                $body
            }
            ResourceModel::SqlLogin($data) => {
                let ($res, $wrap) = (SqlLoginResource, ResourceModel::SqlLogin);
                $body
            }
            ResourceModel::DatabasePermission($data) => {
                let ($res, $wrap) = (DatabasePermissionResource, ResourceModel::DatabasePermission);
                $body
            }
            ResourceModel::SchemaPermission($data) => {
                let ($res, $wrap) = (SchemaPermissionResource, ResourceModel::SchemaPermission);
                $body
            }
        }
    };
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Read,
    Create,
    Update,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Read => "read",
            Op::Create => "create",
            Op::Update => "update",
        };
        f.write_str(s)
    }
}

async fn run<R: Resource>(
    resource: &R,
    op: Op,
    conn: &dyn Connection,
    data: &R::Data,
    wrap: fn(R::Data) -> ResourceModel,
) -> Result<ResourceModel, ProvisionError> {
    let mut resp = Response::new();
    let result = match op {
        Op::Read => resource.read(conn, data, &mut resp).await,
        Op::Create => resource.create(conn, data, &mut resp).await,
        Op::Update => resource.update(conn, data, &mut resp).await,
    };
    let state = resp.into_state().map(wrap);
    match (result, state) {
        (Ok(()), Some(state)) => Ok(state),
        (Ok(()), None) => {
            Err(ResourceError::Configuration(format!("{} {op} returned no state", R::KIND)).into())
        }
        (Err(source), state) => Err(ProvisionError { state, source }),
    }
}

async fn dispatch(op: Op, conn: &dyn Connection, model: &ResourceModel) -> Result<ResourceModel, ProvisionError> {
    debug!("{op} {} {}", model.kind(), model.id().unwrap_or("(new)"));
    with_resource!(model, |resource, data, wrap| run(&resource, op, conn, data, wrap).await)
}

/// Refresh a resource from the server.
pub async fn read(conn: &dyn Connection, state: &ResourceModel) -> Result<ResourceModel, ProvisionError> {
    dispatch(Op::Read, conn, state).await
}

pub async fn create(conn: &dyn Connection, plan: &ResourceModel) -> Result<ResourceModel, ProvisionError> {
    dispatch(Op::Create, conn, plan).await
}

pub async fn update(conn: &dyn Connection, plan: &ResourceModel) -> Result<ResourceModel, ProvisionError> {
    dispatch(Op::Update, conn, plan).await
}

pub async fn delete(conn: &dyn Connection, state: &ResourceModel) -> Result<(), ResourceError> {
    with_resource!(state, |resource, data, _wrap| resource.delete(conn, data).await)?;
    info!("Deleted {} {}", state.kind(), state.id().unwrap_or_default());
    Ok(())
}

/// Attributes of this kind that cannot change in place.
pub fn replace_on_change(model: &ResourceModel) -> &'static [&'static str] {
    fn fields<R: Resource>(_: &R) -> &'static [&'static str] {
        R::REPLACE_ON_CHANGE
    }
    with_resource!(model, |resource, _data, _wrap| fields(&resource))
}

fn to_json(model: &ResourceModel) -> Result<Value, ResourceError> {
    serde_json::to_value(model)
        .map_err(|e| ResourceError::Configuration(format!("cannot serialize {}: {e}", model.kind())))
}

/// Replace-on-change attributes whose planned value differs from `current`.
/// An attribute left unset in the plan never forces replacement.
pub fn replaced_fields(plan: &ResourceModel, current: &ResourceModel) -> Result<Vec<String>, ResourceError> {
    let planned = to_json(plan)?;
    let observed = to_json(current)?;
    Ok(replace_on_change(plan)
        .iter()
        .filter(|field| match planned.get(**field) {
            None | Some(Value::Null) => false,
            Some(want) => observed.get(**field) != Some(want),
        })
        .map(|field| field.to_string())
        .collect())
}

fn without_id(model: &ResourceModel) -> ResourceModel {
    with_resource!(model.clone(), |_resource, data, wrap| {
        let mut data = data;
        data.id = None;
        wrap(data)
    })
}

fn change(action: Action, state: &ResourceModel, replaced_fields: Vec<String>) -> Change {
    Change {
        kind: state.kind(),
        action,
        id: state.id().map(str::to_string),
        replaced_fields,
    }
}

/// Converge one resource. Without an id it is created. With an id it is read
/// back first: a vanished object is recreated, a changed replace-on-change
/// attribute drops and recreates it, anything else is updated in place.
pub async fn apply(conn: &dyn Connection, plan: &ResourceModel) -> Result<(Change, ResourceModel), ProvisionError> {
    let kind = plan.kind();
    let Some(id) = plan.id() else {
        let state = create(conn, plan).await?;
        info!("Created {kind} {}", state.id().unwrap_or_default());
        return Ok((change(Action::Created, &state, Vec::new()), state));
    };

    let current = match read(conn, plan).await {
        Ok(current) => current,
        Err(e) if e.source.is_not_found() => {
            warn!(kind, id, "resource no longer exists, recreating");
            let state = create(conn, &without_id(plan)).await?;
            return Ok((change(Action::Created, &state, Vec::new()), state));
        }
        Err(e) => return Err(e),
    };

    let fields = replaced_fields(plan, &current)?;
    if !fields.is_empty() {
        info!("Replacing {kind} {id}: {} changed", fields.join(", "));
        delete(conn, &current)
            .await
            .map_err(|source| ProvisionError { state: Some(current.clone()), source })?;
        let state = create(conn, &without_id(plan)).await?;
        return Ok((change(Action::Replaced, &state, fields), state));
    }

    let state = update(conn, plan).await?;
    info!("Updated {kind} {id}");
    Ok((change(Action::Updated, &state, Vec::new()), state))
}

/// Apply every plan in order. Failures are recorded and the remaining plans
/// still run, except after a cancellation.
pub async fn apply_all(conn: &dyn Connection, plans: &[ResourceModel]) -> ApplyReport {
    let mut report = ApplyReport::new();
    for plan in plans {
        match apply(conn, plan).await {
            Ok((change, state)) => {
                report.changes.push(change);
                report.states.push(state);
            }
            Err(e) => {
                let kind = e.kind();
                report.errors.push(format!(
                    "{} {}: [{kind}] {e}",
                    plan.kind(),
                    plan.id().unwrap_or("(new)")
                ));
                if let Some(state) = e.state {
                    report.states.push(state);
                }
                if kind == ErrorKind::Cancelled {
                    break;
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Fixture;
    use sqlgrant_domain::{DatabaseRoleMemberData, ServerPrincipalId, ServerRoleData};
    use sqlgrant_sql::values;

    const BY_NAME: &str = "SELECT [principal_id], [type] FROM sys.server_principals WHERE [name] = @p1";
    const SETTINGS: &str = "SELECT [name], [owning_principal_id] FROM sys.server_principals WHERE [principal_id] = @p1 AND [type] = 'R'";

    fn role(id: Option<&str>, name: &str, owner: Option<i32>) -> ResourceModel {
        ResourceModel::ServerRole(ServerRoleData {
            id: id.map(str::to_string),
            name: name.into(),
            owner_id: owner.map(ServerPrincipalId),
        })
    }

    fn expect_settings(f: &Fixture, id: i32, name: &str, owner: i32) {
        f.mock
            .expect_query(SETTINGS)
            .with_args(values![id])
            .will_return_rows(vec![values![name, owner]]);
    }

    fn expect_create_ops(f: &Fixture, id: i32) {
        f.mock.expect_exec("CREATE SERVER ROLE [ops]").will_return_result(0);
        f.mock
            .expect_query(BY_NAME)
            .with_args(values!["ops"])
            .will_return_rows(vec![values![id, "R"]]);
        expect_settings(f, id, "ops", 1);
    }

    #[tokio::test]
    async fn plan_without_id_is_created() {
        let f = Fixture::new();
        expect_create_ops(&f, 270);

        let (change, state) = apply(&f.mock, &role(None, "ops", None)).await.unwrap();

        assert_eq!(change.action, Action::Created);
        assert_eq!(change.id.as_deref(), Some("270"));
        assert_eq!(state, role(Some("270"), "ops", Some(1)));
        f.mock.verify();
    }

    #[tokio::test]
    async fn rename_is_applied_in_place() {
        let f = Fixture::new();
        f.expect_server_principal_type(270, "R");
        expect_settings(&f, 270, "ops", 1);
        f.expect_server_principal_type(270, "R");
        f.expect_server_principal_name(270, "ops");
        f.mock
            .expect_exec("ALTER SERVER ROLE [ops] WITH NAME = [operators]")
            .will_return_result(0);
        expect_settings(&f, 270, "operators", 1);

        let (change, state) = apply(&f.mock, &role(Some("270"), "operators", None)).await.unwrap();

        assert_eq!(change.action, Action::Updated);
        assert_eq!(state, role(Some("270"), "operators", Some(1)));
        f.mock.verify();
    }

    #[tokio::test]
    async fn owner_change_replaces_the_role() {
        let f = Fixture::new();
        f.expect_server_principal_type(270, "R");
        expect_settings(&f, 270, "ops", 1);
        f.expect_server_principal_type(270, "R");
        f.expect_server_principal_name(270, "ops");
        f.mock.expect_exec("DROP SERVER ROLE [ops]").will_return_result(0);
        f.expect_server_principal_name(5, "admin");
        f.mock
            .expect_exec("CREATE SERVER ROLE [ops] AUTHORIZATION [admin]")
            .will_return_result(0);
        f.mock
            .expect_query(BY_NAME)
            .with_args(values!["ops"])
            .will_return_rows(vec![values![271, "R"]]);
        expect_settings(&f, 271, "ops", 5);

        let (change, state) = apply(&f.mock, &role(Some("270"), "ops", Some(5))).await.unwrap();

        assert_eq!(change.action, Action::Replaced);
        assert_eq!(change.replaced_fields, vec!["owner_id".to_string()]);
        assert_eq!(state, role(Some("271"), "ops", Some(5)));
        f.mock.verify();
    }

    #[tokio::test]
    async fn vanished_object_is_recreated() {
        let f = Fixture::new();
        f.mock
            .expect_query("SELECT [type] FROM sys.server_principals WHERE [principal_id] = @p1")
            .with_args(values![270])
            .will_return_rows(vec![]);
        expect_create_ops(&f, 280);

        let (change, state) = apply(&f.mock, &role(Some("270"), "ops", None)).await.unwrap();

        assert_eq!(change.action, Action::Created);
        assert_eq!(state.id(), Some("280"));
        f.mock.verify();
    }

    #[test]
    fn unset_attributes_never_force_replacement() {
        let plan = role(Some("270"), "ops", None);
        let current = role(Some("270"), "ops", Some(1));
        assert!(replaced_fields(&plan, &current).unwrap().is_empty());

        let plan = role(Some("270"), "ops", Some(9));
        assert_eq!(replaced_fields(&plan, &current).unwrap(), vec!["owner_id".to_string()]);
    }

    #[tokio::test]
    async fn apply_all_keeps_going_after_a_failure() {
        let f = Fixture::new();
        expect_create_ops(&f, 270);

        let plans = vec![
            ResourceModel::DatabaseRoleMember(DatabaseRoleMemberData {
                id: None,
                role_id: "7/12".into(),
                member_id: "8/20".into(),
            }),
            role(None, "ops", None),
        ];
        let report = apply_all(&f.mock, &plans).await;

        assert!(!report.is_success());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("database_role_member (new): [configuration]"));
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.states, vec![role(Some("270"), "ops", Some(1))]);
        f.mock.verify();
    }

    #[tokio::test]
    async fn failed_update_reports_error_kind() {
        let f = Fixture::new();
        f.expect_server_principal_type(270, "R");
        expect_settings(&f, 270, "ops", 1);
        f.expect_server_principal_type(270, "R");
        f.expect_server_principal_name(270, "ops");
        f.mock
            .expect_exec("ALTER SERVER ROLE [ops] WITH NAME = [operators]")
            .will_return_error("User does not have permission to perform this action.");

        let err = apply(&f.mock, &role(Some("270"), "operators", None)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SqlExecution);
        assert_eq!(err.to_string(), "User does not have permission to perform this action.");
    }
}
