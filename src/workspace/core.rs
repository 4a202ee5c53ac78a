//! Defines the workspace model and its database queries.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Error;

/// A newtype wrapper for integer workspace IDs.
///
/// Workspace IDs scope every query and mutation, so they get their own type
/// to stop them being mixed up with transaction or user IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(i64);

impl WorkspaceId {
    /// Create a new workspace ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the workspace ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A company whose members share a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    /// The ID of the workspace.
    pub id: WorkspaceId,
    /// The display name, e.g. "Acme Ltd."
    pub name: String,
    /// A short upper-case code that identifies the workspace, e.g. "ACME".
    pub code: String,
    /// When the workspace was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// The unguessable token in the workspace's customer link.
    pub share_token: String,
}

/// Create the workspace table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_workspace_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS workspace (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                share_token TEXT NOT NULL UNIQUE
                )",
        (),
    )?;

    Ok(())
}

/// Create a new workspace.
///
/// The name is trimmed and the code is trimmed and converted to upper case.
/// The workspace gets a random share token for its customer link.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyWorkspaceName] or [Error::EmptyWorkspaceCode] if either is blank,
/// - [Error::DuplicateWorkspaceCode] if another workspace already uses the code,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_workspace(
    name: &str,
    code: &str,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Workspace, Error> {
    let name = name.trim();
    let code = code.trim().to_uppercase();

    if name.is_empty() {
        return Err(Error::EmptyWorkspaceName);
    }

    if code.is_empty() {
        return Err(Error::EmptyWorkspaceCode);
    }

    let share_token = Uuid::new_v4().simple().to_string();

    connection
        .prepare(
            "INSERT INTO workspace (name, code, created_at, share_token) VALUES (?1, ?2, ?3, ?4)
             RETURNING id, name, code, created_at, share_token",
        )?
        .query_row((name, &code, created_at, share_token), map_workspace_row)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateWorkspaceCode(code.clone()),
            error => error.into(),
        })
}

/// Retrieve a workspace by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid workspace,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_workspace(id: WorkspaceId, connection: &Connection) -> Result<Workspace, Error> {
    connection
        .prepare(
            "SELECT id, name, code, created_at, share_token FROM workspace WHERE id = :id",
        )?
        .query_one(&[(":id", &id.as_i64())], map_workspace_row)
        .map_err(|error| error.into())
}

/// Retrieve the workspace whose customer link carries `share_token`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if no workspace has the token,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_workspace_by_share_token(
    share_token: &str,
    connection: &Connection,
) -> Result<Workspace, Error> {
    connection
        .prepare(
            "SELECT id, name, code, created_at, share_token FROM workspace
             WHERE share_token = :share_token",
        )?
        .query_one(&[(":share_token", &share_token)], map_workspace_row)
        .map_err(|error| error.into())
}

/// Get all workspaces, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_workspaces(connection: &Connection) -> Result<Vec<Workspace>, Error> {
    connection
        .prepare(
            "SELECT id, name, code, created_at, share_token FROM workspace
             ORDER BY created_at DESC, id DESC",
        )?
        .query_map([], map_workspace_row)?
        .map(|maybe_workspace| maybe_workspace.map_err(Error::from))
        .collect()
}

/// Delete a workspace.
///
/// The workspace's transactions, categories and chat messages are deleted with
/// it and its members become unassigned.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid workspace,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_workspace(id: WorkspaceId, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM workspace WHERE id = :id", &[(":id", &id.as_i64())])?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_workspace_row(row: &Row) -> Result<Workspace, rusqlite::Error> {
    Ok(Workspace {
        id: WorkspaceId::new(row.get(0)?),
        name: row.get(1)?,
        code: row.get(2)?,
        created_at: row.get(3)?,
        share_token: row.get(4)?,
    })
}
