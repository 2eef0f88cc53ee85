//! Local strategy: drives a co-located instance through `psql`.
//!
//! The instance runs in a container named by the descriptor's address; every
//! operation is a `docker exec` of one of the PostgreSQL command-line tools.
//! Construction performs no I/O, so failures only show up per operation.

use crate::config::{ConnectionDescriptor, Origin};
use crate::db::archive::{self, PG_DUMP, PG_RESTORE};
use crate::db::shell;
use crate::db::sql::{self, Step};
use crate::db::{
    BackupInfo, CreateInfo, DatabaseSummary, DeleteInfo, PasswordChangeInfo, PostgresAdmin,
    Privileges, RecoverInfo,
};
use crate::error::{PanelError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tracing::{debug, info};

/// Container runtime used to reach the instance.
pub const DEFAULT_PROGRAM: &str = "docker";

/// Database psql connects to when neither the step nor the descriptor names one.
const MAINTENANCE_DATABASE: &str = "postgres";

const PASSWORD_ENV: &str = "PGPASSWORD";

/// Field separator for unaligned psql output.
const FIELD_SEPARATOR: &str = "|";

/// Administrative client for a co-located instance.
pub struct LocalClient {
    program: PathBuf,
    container: String,
    username: String,
    password: String,
    database: String,
    closed: AtomicBool,
}

impl std::fmt::Debug for LocalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalClient")
            .field("program", &self.program)
            .field("container", &self.container)
            .field("username", &self.username)
            .field("database", &self.database)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl LocalClient {
    /// Builds the invocation recipe from a descriptor. Never fails.
    pub fn new(descriptor: &ConnectionDescriptor) -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            container: descriptor.address.clone(),
            username: descriptor.username.clone(),
            password: descriptor.password.clone(),
            database: descriptor.database.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Replaces the container runtime executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Executable invoked for every operation.
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Fixed `psql` argument template; the target database and SQL are
    /// appended per call.
    pub fn psql_template(&self) -> Vec<String> {
        let mut args = self.exec_args("psql", false);
        args.extend(
            [
                "-t",
                "-A",
                "-F",
                FIELD_SEPARATOR,
                "-v",
                "ON_ERROR_STOP=1",
                "-U",
                self.username.as_str(),
            ]
            .map(String::from),
        );
        args
    }

    fn exec_args(&self, tool: &str, interactive: bool) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if interactive {
            args.push("-i".to_string());
        }
        args.extend(["-e", PASSWORD_ENV, self.container.as_str(), tool].map(String::from));
        args
    }

    fn command(&self, args: Vec<String>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).env(PASSWORD_ENV, &self.password);
        cmd
    }

    fn default_database(&self) -> &str {
        if self.database.is_empty() {
            MAINTENANCE_DATABASE
        } else {
            &self.database
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PanelError::operation("client is closed"));
        }
        Ok(())
    }

    async fn psql(&self, database: &str, sql: &str) -> Result<String> {
        let mut args = self.psql_template();
        args.extend(["-d", database, "-c", sql].map(String::from));
        shell::run(self.command(args)).await
    }

    async fn execute_steps(&self, steps: Vec<Step>) -> Result<()> {
        self.ensure_open()?;
        for step in steps {
            let database = step.database.as_deref().unwrap_or(self.default_database());
            self.psql(database, &step.sql).await?;
        }
        Ok(())
    }
}

/// Parses `name|owner|encoding` rows from unaligned psql output.
fn parse_database_rows(output: &str) -> Vec<DatabaseSummary> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut fields = line.splitn(3, FIELD_SEPARATOR);
            let name = fields.next()?.to_string();
            let owner = fields.next().unwrap_or_default().to_string();
            let encoding = fields.next().unwrap_or_default().to_string();
            Some(DatabaseSummary {
                name,
                owner,
                encoding,
                from: Origin::Local.as_str().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl PostgresAdmin for LocalClient {
    fn origin(&self) -> Origin {
        Origin::Local
    }

    async fn create(&self, info: &CreateInfo) -> Result<()> {
        self.execute_steps(sql::create_plan(info)?).await?;
        info!("Created database '{}' in container {}", info.name, self.container);
        Ok(())
    }

    async fn create_user(&self, info: &CreateInfo, with_delete_db: bool) -> Result<()> {
        self.execute_steps(sql::create_user_plan(info, with_delete_db)?)
            .await?;
        info!("Created role '{}' in container {}", info.username, self.container);
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

        let mut args = self.exec_args(PG_DUMP, false);
        args.extend(archive::dump_args(&self.username, &info.name));
        shell::run_to_file(self.command(args), &target).await?;

        info!("Backed up '{}' to {}", info.name, target.display());
        Ok(())
    }

    async fn recover(&self, info: &RecoverInfo) -> Result<()> {
        self.ensure_open()?;
        archive::check_source(info).await?;

        let mut args = self.exec_args(PG_RESTORE, true);
        args.extend(archive::restore_args(&self.username, &info.name));
        shell::run_from_file(self.command(args), &info.source_file).await?;

        info!(
            "Restored '{}' from {}",
            info.name,
            info.source_file.display()
        );
        Ok(())
    }

    async fn sync_db(&self) -> Result<Vec<DatabaseSummary>> {
        self.ensure_open()?;
        let output = self
            .psql(self.default_database(), sql::LIST_DATABASES)
            .await?;
        Ok(parse_database_rows(&output))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed local client for container {}", self.container);
        }
    }
}
