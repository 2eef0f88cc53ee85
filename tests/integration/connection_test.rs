//! Connection integration tests.
//!
//! Tests strategy selection, connection-time error classification and close
//! semantics through the public factory.

use pg_panel::config::{ConnectionDescriptor, Origin};
use pg_panel::db::{self, driver, CreateInfo, DeleteInfo};
use pg_panel::error::PanelError;
use std::time::{Duration, Instant};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Returns a local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let descriptor = ConnectionDescriptor::from_connection_string(&url).unwrap();

    let client = db::connect(&descriptor).await.unwrap();
    assert_eq!(client.origin(), Origin::Remote);

    client.close().await;
    client.close().await;
    client.close().await;
}

#[tokio::test]
async fn test_connect_with_wrong_password() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let mut descriptor = ConnectionDescriptor::from_connection_string(&url).unwrap();
    descriptor.password = "definitely-not-the-password".to_string();

    match db::connect(&descriptor).await {
        // Trust auth setups accept any password.
        Ok(client) => client.close().await,
        Err(err) => assert!(
            matches!(err, PanelError::Connection(_)),
            "Expected connection error, got: {err:?}"
        ),
    }
}

#[tokio::test]
async fn test_local_construction_does_no_io() {
    // The container does not exist and the program is never spawned.
    let descriptor = ConnectionDescriptor::local("no-such-container", "postgres");

    let start = Instant::now();
    let client = db::connect(&descriptor).await.unwrap();

    assert_eq!(client.origin(), Origin::Local);
    assert!(start.elapsed() < Duration::from_millis(500));
    client.close().await;
    client.close().await;
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_refused_is_connection_error() {
    let descriptor =
        ConnectionDescriptor::remote("127.0.0.1", closed_port(), "postgres", "pw").with_timeout(2);

    let start = Instant::now();
    let result = db::connect(&descriptor).await;
    let elapsed = start.elapsed();

    let err = result.unwrap_err();
    assert!(
        matches!(err, PanelError::Connection(_)),
        "Expected connection error, got: {err:?}"
    );
    assert!(!err.is_timeout());
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_unresponsive_server_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let descriptor =
        ConnectionDescriptor::remote("127.0.0.1", port, "postgres", "pw").with_timeout(1);

    let start = Instant::now();
    let err = db::connect(&descriptor).await.unwrap_err();
    let elapsed = start.elapsed();
    server.abort();

    assert!(err.is_timeout(), "Expected timeout, got: {err:?}");
    assert_eq!(err.code(), "ErrExecTimeOut");
    assert!(elapsed >= Duration::from_millis(900), "took {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test]
async fn test_connect_invalid_descriptor() {
    let descriptor = ConnectionDescriptor::remote("localhost", 5432, "postgres", "");

    let err = db::connect(&descriptor).await.unwrap_err();
    assert!(matches!(err, PanelError::ConnectionOpen(_)));
    assert!(err.to_string().contains("password"));
}

#[tokio::test]
async fn test_connect_registers_driver() {
    let descriptor = ConnectionDescriptor::remote("127.0.0.1", closed_port(), "postgres", "pw")
        .with_timeout(1);

    let _ = db::connect(&descriptor).await;
    assert!(driver::is_registered());
}

#[tokio::test]
async fn test_special_characters_reach_server_intact() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let admin = db::connect(&ConnectionDescriptor::from_connection_string(&url).unwrap())
        .await
        .unwrap();

    // The server-level connection lands in the database named after the role.
    let role = "pgpanel_escape_test";
    let password = "p@ss:word/1%?#";
    let cleanup = DeleteInfo {
        name: role.to_string(),
        username: role.to_string(),
        force_delete: true,
    };
    let _ = admin.delete(&cleanup).await;
    admin
        .create(&CreateInfo {
            name: role.to_string(),
            username: role.to_string(),
            password: password.to_string(),
            super_user: false,
        })
        .await
        .unwrap();

    let base = ConnectionDescriptor::from_connection_string(&url).unwrap();
    let descriptor = ConnectionDescriptor {
        username: role.to_string(),
        password: password.to_string(),
        ..base
    };
    let client = db::connect(&descriptor).await.unwrap();
    client.close().await;

    admin.delete(&cleanup).await.unwrap();
    admin.close().await;
}
