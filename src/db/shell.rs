//! Child-process helpers for the command-line tools.
//!
//! Wraps `tokio::process::Command` so that spawn failures and non-zero exits
//! surface as operation errors carrying the tool's stderr.

use crate::error::{PanelError, Result};
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Short label for logs and error messages: program plus its first argument.
fn describe(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    let program = std_cmd.get_program().to_string_lossy().into_owned();
    match std_cmd.get_args().next() {
        Some(first) => format!("{program} {}", first.to_string_lossy()),
        None => program,
    }
}

fn check_status(label: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Err(PanelError::operation(format!(
            "`{label}` failed with {}",
            output.status
        )))
    } else {
        Err(PanelError::operation(format!("`{label}` failed: {stderr}")))
    }
}

/// Runs the command to completion and returns its stdout.
pub async fn run(mut cmd: Command) -> Result<String> {
    let label = describe(&cmd);
    debug!("Running {}", label);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| PanelError::operation(format!("Failed to run `{label}`: {e}")))?;

    check_status(&label, &output)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs the command with stdout redirected into `path`.
///
/// The partially written file is removed if the command fails.
pub async fn run_to_file(mut cmd: Command, path: &Path) -> Result<()> {
    let label = describe(&cmd);
    debug!("Running {} > {}", label, path.display());

    let file = tokio::fs::File::create(path).await.map_err(|e| {
        PanelError::operation(format!("Failed to create {}: {e}", path.display()))
    })?;

    // `output()` would re-pipe stdout, so spawn with the file attached instead.
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(file.into_std().await))
        .stderr(Stdio::piped())
        .spawn();

    let result = match child {
        Ok(child) => child
            .wait_with_output()
            .await
            .map_err(|e| PanelError::operation(format!("Failed to wait for `{label}`: {e}")))
            .and_then(|output| check_status(&label, &output)),
        Err(e) => Err(PanelError::operation(format!(
            "Failed to run `{label}`: {e}"
        ))),
    };

    if result.is_err() {
        let _ = tokio::fs::remove_file(path).await;
    }
    result
}

/// Runs the command with stdin fed from `path`.
pub async fn run_from_file(mut cmd: Command, path: &Path) -> Result<()> {
    let label = describe(&cmd);
    debug!("Running {} < {}", label, path.display());

    let file = tokio::fs::File::open(path).await.map_err(|e| {
        PanelError::operation(format!("Failed to open {}: {e}", path.display()))
    })?;

    let output = cmd
        .stdin(Stdio::from(file.into_std().await))
        .output()
        .await
        .map_err(|e| PanelError::operation(format!("Failed to run `{label}`: {e}")))?;

    check_status(&label, &output)
}
