use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlgrant_domain::{DatabaseId, DatabasePrincipalId, DomainError};
use sqlgrant_sql::{Connection, Database};

use crate::error::ResourceError;

/// State handed back to the caller. Whatever a resource operation stored
/// here before failing is kept, so the caller sees every step that
/// completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<D> {
    pub state: Option<D>,
}

impl<D> Response<D> {
    pub fn new() -> Self {
        Self { state: None }
    }

    pub fn set_state(&mut self, state: D) {
        self.state = Some(state);
    }

    pub fn into_state(self) -> Option<D> {
        self.state
    }
}

impl<D> Default for Response<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// One provisionable object type.
///
/// `conn` is always a server-level connection; database-scoped resources
/// open their own connection to the database named in their data.
#[async_trait]
pub trait Resource: Send + Sync {
    type Data: Serialize + Clone + Send + Sync;

    const KIND: &'static str;

    /// Attributes that cannot change in place. A change to any of them
    /// means dropping and recreating the object.
    const REPLACE_ON_CHANGE: &'static [&'static str] = &[];

    /// Refresh `state` from the server. The server is always the source of truth.
    async fn read(
        &self,
        conn: &dyn Connection,
        state: &Self::Data,
        resp: &mut Response<Self::Data>,
    ) -> Result<(), ResourceError>;

    async fn create(
        &self,
        conn: &dyn Connection,
        plan: &Self::Data,
        resp: &mut Response<Self::Data>,
    ) -> Result<(), ResourceError>;

    /// Apply in-place changes. `plan.id` identifies the object.
    async fn update(
        &self,
        conn: &dyn Connection,
        plan: &Self::Data,
        resp: &mut Response<Self::Data>,
    ) -> Result<(), ResourceError>;

    async fn delete(&self, conn: &dyn Connection, state: &Self::Data) -> Result<(), ResourceError>;
}

/// Parse the stored composite id of a resource.
pub(crate) fn parse_id<T>(id: Option<&str>, kind: &'static str) -> Result<T, ResourceError>
where
    T: FromStr<Err = DomainError>,
{
    let id = id.ok_or_else(|| ResourceError::Configuration(format!("{kind} has no id")))?;
    Ok(id.parse()?)
}

/// Connection scoped to the database the resource lives in.
pub(crate) async fn database_conn(
    conn: &dyn Connection,
    database_id: DatabaseId,
) -> Result<Arc<dyn Connection>, ResourceError> {
    let db = Database::get(conn, database_id).await?;
    Ok(db.connect().await?)
}

/// Run `read` against a seed carrying only the id and return what the server reports.
pub(crate) async fn refresh<R: Resource>(
    resource: &R,
    conn: &dyn Connection,
    seed: &R::Data,
) -> Result<R::Data, ResourceError> {
    let mut resp = Response::new();
    resource.read(conn, seed, &mut resp).await?;
    resp.into_state()
        .ok_or_else(|| ResourceError::Configuration(format!("{} read returned no state", R::KIND)))
}

/// Check that a field read back after a mutation holds the value just written.
pub(crate) fn confirm<T: PartialEq + Display>(
    kind: &'static str,
    field: &'static str,
    expected: &T,
    found: &T,
) -> Result<(), ResourceError> {
    if expected == found {
        return Ok(());
    }
    Err(ResourceError::NotApplied {
        kind,
        field,
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

/// Owner read back after a change. The empty owner resolves to the connected
/// user on the server and has no fixed id to compare against.
pub(crate) fn confirm_owner(
    kind: &'static str,
    planned: Option<DatabasePrincipalId>,
    found: Option<DatabasePrincipalId>,
) -> Result<(), ResourceError> {
    match (planned, found) {
        (Some(expected), Some(found)) if !expected.is_empty() => confirm(kind, "owner_id", &expected, &found),
        _ => Ok(()),
    }
}
