use async_trait::async_trait;

use crate::error::SqlError;

/// Capabilities shared by every entity handle.
///
/// A handle is a transient view over server state: it holds a borrowed
/// connection and an identifier, and re-reads whatever it needs on each call.
#[async_trait]
pub trait Entity: Send + Sync {
    type Id: Clone + Send + Sync;
    type Settings: Send;

    /// The identifier the handle was built with. Never queries.
    fn id(&self) -> Self::Id;

    /// Current name, read from the server.
    async fn name(&self) -> Result<String, SqlError>;

    /// Observed configuration of the object.
    async fn settings(&self) -> Result<Self::Settings, SqlError>;

    /// Remove the object from the server.
    async fn drop(&self) -> Result<(), SqlError>;
}

/// Entities that can be renamed in place.
#[async_trait]
pub trait Renameable: Entity {
    async fn rename(&self, new_name: &str) -> Result<(), SqlError>;
}

/// Entities owned by another principal.
#[async_trait]
pub trait Owned: Entity {
    type OwnerId: Copy + Send + Sync;

    async fn owner_id(&self) -> Result<Self::OwnerId, SqlError>;

    async fn change_owner(&self, owner: Self::OwnerId) -> Result<(), SqlError>;
}
