//! Backup and restore plumbing shared by both strategies.
//!
//! Archives are `pg_dump` custom-format files. The strategies differ only in
//! how the tools are reached (inside the container or on the host).

use crate::db::sql::validate_name;
use crate::db::types::{BackupInfo, RecoverInfo};
use crate::error::{PanelError, Result};
use std::path::PathBuf;

pub const PG_DUMP: &str = "pg_dump";
pub const PG_RESTORE: &str = "pg_restore";

/// `pg_dump` arguments writing a custom-format archive to stdout.
pub fn dump_args(username: &str, database: &str) -> Vec<String> {
    vec![
        "--username".to_string(),
        username.to_string(),
        "--format=custom".to_string(),
        "--dbname".to_string(),
        database.to_string(),
    ]
}

/// `pg_restore` arguments reading an archive from stdin.
pub fn restore_args(username: &str, database: &str) -> Vec<String> {
    vec![
        "--username".to_string(),
        username.to_string(),
        "--clean".to_string(),
        "--if-exists".to_string(),
        "--no-owner".to_string(),
        "--dbname".to_string(),
        database.to_string(),
    ]
}

/// `pg_dump` and `pg_restore` read a `--dbname` containing `=` or starting
/// with a URI scheme as a connection string.
fn validate_dbname(name: &str) -> Result<()> {
    validate_name("database", name)?;
    if name.contains('=') || name.starts_with("postgres://") || name.starts_with("postgresql://")
    {
        return Err(PanelError::operation(format!(
            "database name '{name}' would be read as a connection string"
        )));
    }
    Ok(())
}

/// Validates the request and creates the target directory.
pub async fn prepare_target(info: &BackupInfo) -> Result<PathBuf> {
    validate_dbname(&info.name)?;
    if info.file_name.is_empty() || info.file_name.contains('/') {
        return Err(PanelError::operation(format!(
            "invalid backup file name '{}'",
            info.file_name
        )));
    }

    tokio::fs::create_dir_all(&info.target_dir)
        .await
        .map_err(|e| {
            PanelError::operation(format!(
                "Failed to create {}: {e}",
                info.target_dir.display()
            ))
        })?;
    Ok(info.target_path())
}

/// Validates the request and checks the archive exists.
pub async fn check_source(info: &RecoverInfo) -> Result<()> {
    validate_dbname(&info.name)?;
    let exists = tokio::fs::try_exists(&info.source_file)
        .await
        .unwrap_or(false);
    if !exists {
        return Err(PanelError::operation(format!(
            "backup file {} does not exist",
            info.source_file.display()
        )));
    }
    Ok(())
}
