//! Remote strategy: drives a network-reachable instance through sqlx.
//!
//! Provides the `RemoteClient` struct that implements the `PostgresAdmin`
//! trait on top of a lazily connected `AnyPool`.

use crate::config::{compose_connection_string, ConnectionDescriptor, Origin};
use crate::db::archive::{self, PG_DUMP, PG_RESTORE};
use crate::db::sql::{self, Step};
use crate::db::{
    driver, shell, BackupInfo, CreateInfo, DatabaseSummary, DeleteInfo, PasswordChangeInfo,
    PostgresAdmin, Privileges, RecoverInfo,
};
use crate::error::{PanelError, Result};
use async_trait::async_trait;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyConnection, AnyPool, Connection, Executor};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Upper bound on pooled connections per client.
const MAX_CONNECTIONS: u32 = 5;

/// Acquire timeout for operations once the client is established.
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

const PASSWORD_ENV: &str = "PGPASSWORD";

/// Administrative client for a network-reachable instance.
pub struct RemoteClient {
    pool: AnyPool,
    from: Origin,
    database: String,
    user: String,
    password: String,
    address: String,
    port: u16,
    tool_dir: Option<PathBuf>,
}

// Hand-written so the password never reaches logs.
impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("from", &self.from)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("closed", &self.pool.is_closed())
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    /// Opens the pool and confirms liveness within the descriptor's timeout.
    ///
    /// Fails with [`PanelError::ConnectionOpen`] if the connection string is
    /// rejected, [`PanelError::Timeout`] if the probe does not finish in time,
    /// and [`PanelError::Connection`] if the probe fails before the deadline.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        descriptor.validate().map_err(|e| match e {
            PanelError::Config(msg) => PanelError::connection_open(msg),
            other => other,
        })?;

        driver::register();

        let options = open_options(&descriptor.connection_string())?;
        let pool = AnyPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_lazy_with(options.clone());

        let target = format!("{}:{}", descriptor.address, descriptor.port);
        if let Err(e) = probe(&options, &target, descriptor.timeout_duration()).await {
            pool.close().await;
            return Err(match e {
                ProbeError::Elapsed => {
                    PanelError::timeout(target, descriptor.timeout_duration())
                }
                ProbeError::Failed(err) => map_connection_error(err, descriptor),
            });
        }

        info!("Connected to {}", descriptor.display_string());
        Ok(Self::from_pool(pool, descriptor))
    }

    /// Wraps an existing pool without probing it.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: AnyPool, descriptor: &ConnectionDescriptor) -> Self {
        Self {
            pool,
            from: Origin::Remote,
            database: descriptor.database.clone(),
            user: descriptor.username.clone(),
            password: descriptor.password.clone(),
            address: descriptor.address.clone(),
            port: descriptor.port,
            tool_dir: None,
        }
    }

    /// Looks up `pg_dump`/`pg_restore` in `dir` instead of `PATH`.
    pub fn with_tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_dir = Some(dir.into());
        self
    }

    /// Database named by the descriptor this client was built from.
    pub fn database(&self) -> &str {
        &self.database
    }

    fn ensure_open(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(PanelError::operation("client is closed"));
        }
        Ok(())
    }

    /// Connection string for a specific database, re-derived from the
    /// retained credentials.
    fn connection_string_for(&self, database: &str) -> String {
        compose_connection_string(
            &self.user,
            &self.password,
            &self.address,
            self.port,
            Some(database),
        )
    }

    async fn execute_in(&self, database: &str, sql: &str) -> Result<()> {
        let options = open_options(&self.connection_string_for(database))?;
        let mut conn = AnyConnection::connect_with(&options)
            .await
            .map_err(|e| PanelError::operation(format_query_error(e)))?;

        let result = conn
            .execute(sql)
            .await
            .map(|_| ())
            .map_err(|e| PanelError::operation(format_query_error(e)));

        if let Err(e) = conn.close().await {
            warn!("Failed to close connection to '{}': {}", database, e);
        }
        result
    }

    async fn execute_steps(&self, steps: Vec<Step>) -> Result<()> {
        self.ensure_open()?;
        for step in steps {
            match step.database.as_deref() {
                Some(database) => self.execute_in(database, &step.sql).await?,
                None => {
                    self.pool
                        .execute(step.sql.as_str())
                        .await
                        .map_err(|e| PanelError::operation(format_query_error(e)))?;
                }
            }
        }
        Ok(())
    }

    fn tool(&self, name: &str) -> Command {
        let program = match &self.tool_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        };
        let mut cmd = Command::new(program);
        cmd.arg("--host")
            .arg(&self.address)
            .arg("--port")
            .arg(self.port.to_string())
            .env(PASSWORD_ENV, &self.password);
        cmd
    }
}

/// Parses a connection string; a rejection is a connection setup error.
fn open_options(conn_str: &str) -> Result<AnyConnectOptions> {
    conn_str
        .parse::<AnyConnectOptions>()
        .map_err(|e| PanelError::connection_open(format!("Invalid connection string: {e}")))
}

enum ProbeError {
    Elapsed,
    Failed(sqlx::Error),
}

/// Opens one connection and pings it, abandoning the attempt at `deadline`.
///
/// The probe connects directly instead of through the pool: the pool retries
/// refused connections until its acquire timeout, which would turn a refusal
/// into a timeout.
async fn probe(
    options: &AnyConnectOptions,
    target: &str,
    deadline: Duration,
) -> std::result::Result<(), ProbeError> {
    let start = Instant::now();
    debug!("Probing {} (deadline {:?})", target, deadline);

    let attempt = async {
        let mut conn = AnyConnection::connect_with(options).await?;
        conn.ping().await?;
        conn.close().await
    };

    match tokio::time::timeout(deadline, attempt).await {
        Ok(Ok(())) => {
            debug!("Probe of {} succeeded in {:?}", target, start.elapsed());
            Ok(())
        }
        Ok(Err(e)) => {
            debug!("Probe of {} failed after {:?}: {}", target, start.elapsed(), e);
            Err(ProbeError::Failed(e))
        }
        Err(_) => {
            warn!("Probe of {} exceeded {:?}", target, deadline);
            Err(ProbeError::Elapsed)
        }
    }
}

#[async_trait]
impl PostgresAdmin for RemoteClient {
    fn origin(&self) -> Origin {
        self.from
    }

    async fn create(&self, info: &CreateInfo) -> Result<()> {
        self.execute_steps(sql::create_plan(info)?).await?;
        info!("Created database '{}' on {}:{}", info.name, self.address, self.port);
        Ok(())
    }

    async fn create_user(&self, info: &CreateInfo, with_delete_db: bool) -> Result<()> {
        self.execute_steps(sql::create_user_plan(info, with_delete_db)?)
            .await?;
        info!("Created role '{}' on {}:{}", info.username, self.address, self.port);
        Ok(())
    }

    async fn delete(&self, info: &DeleteInfo) -> Result<()> {
        self.execute_steps(sql::delete_plan(info)?).await
    }

    async fn change_privileges(&self, info: &Privileges) -> Result<()> {
        self.execute_steps(sql::change_privileges_plan(info)?).await
    }

    async fn change_password(&self, info: &PasswordChangeInfo) -> Result<()> {
        self.execute_steps(sql::change_password_plan(info)?).await
    }

    async fn backup(&self, info: &BackupInfo) -> Result<()> {
        self.ensure_open()?;
        let target = archive::prepare_target(info).await?;

        let mut cmd = self.tool(PG_DUMP);
        cmd.args(archive::dump_args(&self.user, &info.name));
        shell::run_to_file(cmd, &target).await?;

        info!("Backed up '{}' to {}", info.name, target.display());
        Ok(())
    }

    async fn recover(&self, info: &RecoverInfo) -> Result<()> {
        self.ensure_open()?;
        archive::check_source(info).await?;

        let mut cmd = self.tool(PG_RESTORE);
        cmd.args(archive::restore_args(&self.user, &info.name));
        shell::run_from_file(cmd, &info.source_file).await?;

        info!(
            "Restored '{}' from {}",
            info.name,
            info.source_file.display()
        );
        Ok(())
    }

    async fn sync_db(&self) -> Result<Vec<DatabaseSummary>> {
        self.ensure_open()?;
        let rows: Vec<(String, String, String)> = sqlx::query_as(sql::LIST_DATABASES)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                PanelError::operation(format!(
                    "Failed to list databases: {}",
                    format_query_error(e)
                ))
            })?;

        Ok(rows
            .into_iter()
            .map(|(name, owner, encoding)| DatabaseSummary {
                name,
                owner,
                encoding,
                from: self.from.as_str().to_string(),
            })
            .collect())
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            debug!("Closed pool for {}:{}", self.address, self.port);
        }
    }
}

/// Maps probe failures to user-friendly connection errors.
fn map_connection_error(error: sqlx::Error, descriptor: &ConnectionDescriptor) -> PanelError {
    let host = &descriptor.address;
    let port = descriptor.port;
    let user = &descriptor.username;

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        PanelError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running: {error}"
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        PanelError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials: {error}"
        ))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        PanelError::connection(format!("TLS negotiation with {host}:{port} failed: {error}"))
    } else {
        PanelError::connection(error.to_string())
    }
}

/// Formats a driver error with PostgreSQL detail and hint if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
