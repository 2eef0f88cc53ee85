//! pg-panel - Administrative client for local and remote PostgreSQL instances.

mod cli;

use cli::{Cli, Command};
use pg_panel::config::Config;
use pg_panel::db::{
    self, BackupInfo, CreateInfo, DeleteInfo, PasswordChangeInfo, PostgresAdmin, Privileges,
    RecoverInfo,
};
use pg_panel::error::{PanelError, Result};
use pg_panel::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{} [{}]: {}", e.category(), e.code(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let descriptor = cli.resolve_descriptor(&config)?;
    info!("Instance: {}", descriptor.display_string());

    let client = db::connect(&descriptor).await?;
    let result = execute(client.as_ref(), cli.command).await;
    client.close().await;
    result
}

async fn execute(client: &dyn PostgresAdmin, command: Command) -> Result<()> {
    match command {
        Command::Create {
            name,
            owner,
            role_password,
            superuser,
        } => {
            client
                .create(&CreateInfo {
                    name,
                    username: owner,
                    password: role_password,
                    super_user: superuser,
                })
                .await
        }
        Command::CreateUser {
            username,
            role_password,
            superuser,
            drop_database,
        } => {
            let with_delete_db = drop_database.is_some();
            client
                .create_user(
                    &CreateInfo {
                        name: drop_database.unwrap_or_default(),
                        username,
                        password: role_password,
                        super_user: superuser,
                    },
                    with_delete_db,
                )
                .await
        }
        Command::Delete { name, role, force } => {
            client
                .delete(&DeleteInfo {
                    name: name.unwrap_or_default(),
                    username: role.unwrap_or_default(),
                    force_delete: force,
                })
                .await
        }
        Command::Privileges {
            username,
            target,
            superuser,
            revoke,
        } => {
            client
                .change_privileges(&Privileges {
                    username,
                    database: target,
                    super_user: superuser,
                    grant: !revoke,
                })
                .await
        }
        Command::Password {
            username,
            role_password,
        } => {
            client
                .change_password(&PasswordChangeInfo {
                    username,
                    password: role_password,
                })
                .await
        }
        Command::Backup { target, dir, file } => {
            let file_name = file.unwrap_or_else(|| format!("{target}.dump"));
            client
                .backup(&BackupInfo {
                    name: target,
                    target_dir: dir,
                    file_name,
                })
                .await
        }
        Command::Recover { target, file } => {
            client
                .recover(&RecoverInfo {
                    name: target,
                    source_file: file,
                })
                .await
        }
        Command::List { json } => {
            let databases = client.sync_db().await?;
            if json {
                let out = serde_json::to_string_pretty(&databases)
                    .map_err(|e| PanelError::internal(format!("Failed to encode output: {e}")))?;
                println!("{out}");
            } else {
                for database in databases {
                    println!("{}\t{}\t{}", database.name, database.owner, database.encoding);
                }
            }
            Ok(())
        }
        Command::Ping => {
            // Local clients do no I/O until an operation runs.
            let count = client.sync_db().await?.len();
            println!("OK ({}, {count} databases)", client.origin());
            Ok(())
        }
    }
}
