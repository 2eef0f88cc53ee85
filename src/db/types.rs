//! Operation payloads for the administrative interface.
//!
//! These are passed through to the strategies untouched; each strategy decides
//! how to turn them into SQL or shell invocations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters for creating a database and its owning role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateInfo {
    /// Database name.
    pub name: String,

    /// Owning role.
    pub username: String,

    /// Password for the owning role.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Grants SUPERUSER to the role when set.
    #[serde(default)]
    pub super_user: bool,
}

/// Parameters for dropping a database and/or its owning role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteInfo {
    /// Database to drop; empty skips the database.
    #[serde(default)]
    pub name: String,

    /// Role to drop; empty skips the role.
    #[serde(default)]
    pub username: String,

    /// Terminates open sessions before dropping the database.
    #[serde(default)]
    pub force_delete: bool,
}

/// Privilege change for a role on a database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Privileges {
    /// Target role.
    pub username: String,

    /// Target database.
    pub database: String,

    /// SUPERUSER when true; otherwise NOSUPERUSER.
    #[serde(default)]
    pub super_user: bool,

    /// Grants ALL on the database when true; revokes it when false.
    #[serde(default = "default_grant")]
    pub grant: bool,
}

fn default_grant() -> bool {
    true
}

/// New credentials for an existing role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordChangeInfo {
    pub username: String,

    #[serde(default, skip_serializing)]
    pub password: String,
}

/// Where to write a backup archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupInfo {
    /// Database to dump.
    pub name: String,

    /// Directory receiving the archive; created if missing.
    pub target_dir: PathBuf,

    /// Archive file name inside `target_dir`.
    pub file_name: String,
}

impl BackupInfo {
    /// Full path of the archive.
    pub fn target_path(&self) -> PathBuf {
        self.target_dir.join(&self.file_name)
    }
}

/// Which archive to restore into which database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoverInfo {
    /// Database receiving the restore.
    pub name: String,

    /// Archive produced by a previous backup.
    pub source_file: PathBuf,
}

/// A database reported by [`super::PostgresAdmin::sync_db`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseSummary {
    pub name: String,

    /// Owning role as reported by the engine.
    pub owner: String,

    /// Server encoding (e.g. `UTF8`).
    pub encoding: String,

    /// Origin tag of the client that listed it.
    pub from: String,
}
