//! SQL statement building shared by both strategies.
//!
//! Each administrative operation is turned into a list of [`Step`]s. A step is
//! one statement plus the database it must run in (`None` means any
//! connection to the server will do). The local strategy feeds steps to
//! `psql`, the remote strategy executes them through the pool, so both issue
//! identical SQL.

use crate::db::types::{CreateInfo, DeleteInfo, PasswordChangeInfo, Privileges};
use crate::error::{PanelError, Result};

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENTIFIER_BYTES: usize = 63;

/// Dollar-quote tag used for anonymous `DO` blocks.
const DO_BLOCK_TAG: &str = "$panel$";

/// Lists user databases with owner and encoding, one row per database.
pub const LIST_DATABASES: &str = r#"
SELECT
    datname::text,
    pg_get_userbyid(datdba)::text,
    pg_encoding_to_char(encoding)::text
FROM pg_database
WHERE datistemplate = false AND datname <> 'postgres'
"#;

/// A single statement and the database it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub sql: String,
    pub database: Option<String>,
}

impl Step {
    fn server(sql: String) -> Self {
        Self {
            sql,
            database: None,
        }
    }

    fn in_database(sql: String, database: &str) -> Self {
        Self {
            sql,
            database: Some(database.to_string()),
        }
    }
}

/// Quotes an identifier, doubling embedded double quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Rejects names PostgreSQL would refuse or silently truncate.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PanelError::operation(format!("{kind} name must not be empty")));
    }
    if name.contains('\0') {
        return Err(PanelError::operation(format!(
            "{kind} name must not contain NUL bytes"
        )));
    }
    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(PanelError::operation(format!(
            "{kind} name '{name}' exceeds {MAX_IDENTIFIER_BYTES} bytes"
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.contains('\0') {
        return Err(PanelError::operation("password must not contain NUL bytes"));
    }
    if password.contains(DO_BLOCK_TAG) {
        return Err(PanelError::operation(format!(
            "password must not contain '{DO_BLOCK_TAG}'"
        )));
    }
    Ok(())
}

fn create_role(username: &str, password: &str, super_user: bool) -> String {
    let mut sql = format!(
        "CREATE ROLE {} WITH LOGIN PASSWORD {}",
        quote_ident(username),
        quote_literal(password)
    );
    if super_user {
        sql.push_str(" SUPERUSER");
    }
    sql
}

fn ensure_role(username: &str, password: &str, super_user: bool) -> String {
    format!(
        "DO {tag} BEGIN IF NOT EXISTS (SELECT FROM pg_catalog.pg_roles WHERE rolname = {name}) THEN {create}; END IF; END {tag}",
        tag = DO_BLOCK_TAG,
        name = quote_literal(username),
        create = create_role(username, password, super_user),
    )
}

fn drop_database(name: &str, force: bool) -> String {
    let mut sql = format!("DROP DATABASE IF EXISTS {}", quote_ident(name));
    if force {
        sql.push_str(" WITH (FORCE)");
    }
    sql
}

/// Database plus (if absent) its owning role.
pub fn create_plan(info: &CreateInfo) -> Result<Vec<Step>> {
    validate_name("database", &info.name)?;
    validate_name("role", &info.username)?;
    validate_password(&info.password)?;
    if info.username.contains(DO_BLOCK_TAG) {
        return Err(PanelError::operation(format!(
            "role name must not contain '{DO_BLOCK_TAG}'"
        )));
    }

    Ok(vec![
        Step::server(ensure_role(&info.username, &info.password, info.super_user)),
        Step::server(format!(
            "CREATE DATABASE {} OWNER {}",
            quote_ident(&info.name),
            quote_ident(&info.username)
        )),
        Step::server(format!(
            "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
            quote_ident(&info.name),
            quote_ident(&info.username)
        )),
    ])
}

/// Role creation, optionally preceded by dropping the role's database.
pub fn create_user_plan(info: &CreateInfo, with_delete_db: bool) -> Result<Vec<Step>> {
    validate_name("role", &info.username)?;
    validate_password(&info.password)?;

    let mut steps = Vec::with_capacity(2);
    if with_delete_db {
        validate_name("database", &info.name)?;
        steps.push(Step::server(drop_database(&info.name, false)));
    }
    steps.push(Step::server(create_role(
        &info.username,
        &info.password,
        info.super_user,
    )));
    Ok(steps)
}

pub fn delete_plan(info: &DeleteInfo) -> Result<Vec<Step>> {
    if info.name.is_empty() && info.username.is_empty() {
        return Err(PanelError::operation(
            "nothing to delete: both database and role are empty",
        ));
    }

    let mut steps = Vec::with_capacity(2);
    if !info.name.is_empty() {
        validate_name("database", &info.name)?;
        steps.push(Step::server(drop_database(&info.name, info.force_delete)));
    }
    if !info.username.is_empty() {
        validate_name("role", &info.username)?;
        steps.push(Step::server(format!(
            "DROP ROLE IF EXISTS {}",
            quote_ident(&info.username)
        )));
    }
    Ok(steps)
}

/// Superuser toggle plus database and `public` schema grants.
///
/// The schema statement has to run inside the target database.
pub fn change_privileges_plan(info: &Privileges) -> Result<Vec<Step>> {
    validate_name("role", &info.username)?;
    validate_name("database", &info.database)?;

    let role = quote_ident(&info.username);
    let database = quote_ident(&info.database);
    let superuser = if info.super_user {
        "SUPERUSER"
    } else {
        "NOSUPERUSER"
    };

    let mut steps = vec![Step::server(format!("ALTER ROLE {role} WITH {superuser}"))];
    if info.grant {
        steps.push(Step::server(format!(
            "GRANT ALL PRIVILEGES ON DATABASE {database} TO {role}"
        )));
        steps.push(Step::in_database(
            format!("GRANT ALL ON SCHEMA public TO {role}"),
            &info.database,
        ));
    } else {
        steps.push(Step::server(format!(
            "REVOKE ALL PRIVILEGES ON DATABASE {database} FROM {role}"
        )));
        steps.push(Step::in_database(
            format!("REVOKE ALL ON SCHEMA public FROM {role}"),
            &info.database,
        ));
    }
    Ok(steps)
}

pub fn change_password_plan(info: &PasswordChangeInfo) -> Result<Vec<Step>> {
    validate_name("role", &info.username)?;
    validate_password(&info.password)?;

    Ok(vec![Step::server(format!(
        "ALTER ROLE {} WITH PASSWORD {}",
        quote_ident(&info.username),
        quote_literal(&info.password)
    ))])
}
