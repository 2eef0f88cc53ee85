//! Administrative client layer for pg-panel.
//!
//! Provides a trait-based interface for PostgreSQL lifecycle operations, with
//! one strategy for co-located instances (shell tools inside the container)
//! and one for remote instances (pooled sqlx connection).

mod archive;
pub mod driver;
mod local;
mod remote;
pub mod shell;
pub mod sql;
mod types;

pub use local::LocalClient;
pub use remote::RemoteClient;
pub use types::{
    BackupInfo, CreateInfo, DatabaseSummary, DeleteInfo, PasswordChangeInfo, Privileges,
    RecoverInfo,
};

use crate::config::{ConnectionDescriptor, Origin};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Creates an administrative client for the given descriptor.
///
/// This is the central factory function. Local clients are built without any
/// I/O and never fail here; remote clients are opened and probed first.
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Box<dyn PostgresAdmin>> {
    debug!("Creating {} client for {}", descriptor.origin, descriptor.display_string());
    match descriptor.origin {
        Origin::Local => Ok(Box::new(LocalClient::new(descriptor))),
        Origin::Remote => {
            let client = RemoteClient::connect(descriptor).await?;
            Ok(Box::new(client))
        }
    }
}

/// Trait defining the administrative interface shared by both strategies.
///
/// Operations fail with `PanelError::Operation` and are never retried here.
#[async_trait]
pub trait PostgresAdmin: Send + Sync + std::fmt::Debug {
    /// Which strategy backs this client.
    fn origin(&self) -> Origin;

    /// Creates a database, creating its owning role first if needed.
    async fn create(&self, info: &CreateInfo) -> Result<()>;

    /// Creates a role; drops `info.name` first when `with_delete_db` is set.
    async fn create_user(&self, info: &CreateInfo, with_delete_db: bool) -> Result<()>;

    /// Drops a database and/or its owning role.
    async fn delete(&self, info: &DeleteInfo) -> Result<()>;

    /// Toggles superuser and grants or revokes the role's rights on a database.
    async fn change_privileges(&self, info: &Privileges) -> Result<()>;

    /// Sets a new login password for the role.
    async fn change_password(&self, info: &PasswordChangeInfo) -> Result<()>;

    /// Writes a custom-format archive of `info.name`.
    async fn backup(&self, info: &BackupInfo) -> Result<()>;

    /// Restores a database from an archive written by [`PostgresAdmin::backup`].
    async fn recover(&self, info: &RecoverInfo) -> Result<()>;

    /// Lists user databases. Order is unspecified.
    async fn sync_db(&self) -> Result<Vec<DatabaseSummary>>;

    /// Releases the underlying resource. Further calls are no-ops.
    async fn close(&self);
}
