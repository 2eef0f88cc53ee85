//! Local strategy tests.
//!
//! A shell script stands in for the container runtime so the full invocation
//! path runs without Docker.

use pg_panel::config::ConnectionDescriptor;
use pg_panel::db::{BackupInfo, CreateInfo, DeleteInfo, LocalClient, PostgresAdmin, RecoverInfo};
use pg_panel::error::PanelError;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Fake runtime: `pg_dump` prints an archive, `pg_restore` copies stdin to
/// `restored`, `psql` prints two database rows. Every call is logged.
fn install_fake_runtime(dir: &Path) -> PathBuf {
    let script = format!(
        r#"#!/bin/sh
printf '%s' "$*" | tr '\n' ' ' >> '{log}'
echo >> '{log}'
case "$*" in
  *pg_dump*) printf 'PGDMP-archive' ;;
  *pg_restore*) cat > '{restored}' ;;
  *DROP*ROLE*) echo 'ERROR:  role "ghost" cannot be dropped' >&2; exit 1 ;;
  *) printf 'shop|app|UTF8\nblog|writer|UTF8\n' ;;
esac
"#,
        log = dir.join("calls.log").display(),
        restored = dir.join("restored").display(),
    );
    let path = dir.join("docker");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn client(dir: &Path) -> LocalClient {
    let descriptor = ConnectionDescriptor::local("1Panel-postgresql-test", "postgres");
    LocalClient::new(&descriptor).with_program(install_fake_runtime(dir))
}

#[tokio::test]
async fn test_sync_db_lists_all_rows() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let mut names: Vec<String> = client
        .sync_db()
        .await
        .unwrap()
        .into_iter()
        .map(|db| db.name)
        .collect();
    names.sort();

    assert_eq!(names, vec!["blog", "shop"]);
    let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
    assert_eq!(calls.lines().count(), 1);
}

#[tokio::test]
async fn test_backup_then_recover_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let backup = BackupInfo {
        name: "shop".to_string(),
        target_dir: dir.path().join("backups"),
        file_name: "shop.dump".to_string(),
    };
    client.backup(&backup).await.unwrap();
    let archive = std::fs::read_to_string(backup.target_path()).unwrap();
    assert_eq!(archive, "PGDMP-archive");

    client
        .recover(&RecoverInfo {
            name: "shop".to_string(),
            source_file: backup.target_path(),
        })
        .await
        .unwrap();

    let restored = std::fs::read_to_string(dir.path().join("restored")).unwrap();
    assert_eq!(restored, "PGDMP-archive");
}

#[tokio::test]
async fn test_delete_stops_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let err = client
        .delete(&DeleteInfo {
            name: "shop".to_string(),
            username: "ghost".to_string(),
            force_delete: false,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PanelError::Operation(_)));
    assert!(err.to_string().contains("cannot be dropped"));

    let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
    assert_eq!(calls.lines().count(), 2);
}

#[tokio::test]
async fn test_invalid_input_never_spawns() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let err = client
        .create(&CreateInfo {
            name: "x".repeat(64),
            username: "app".to_string(),
            password: "pw".to_string(),
            super_user: false,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PanelError::Operation(_)));
    assert!(!dir.path().join("calls.log").exists());
}
