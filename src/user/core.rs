//! Code for creating the user table and managing users in the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, workspace::WorkspaceId};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(i64);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The name shown next to the user's transactions and messages.
    pub username: String,
    /// The user's email address, unique across all users.
    pub email: String,
    /// Whether the user can access the admin panel.
    pub is_admin: bool,
    /// Whether the user has been locked out by an administrator.
    pub is_banned: bool,
    /// The workspace the user has been assigned to.
    ///
    /// Users without a workspace are pending approval and cannot record
    /// transactions.
    pub workspace_id: Option<WorkspaceId>,
    /// When the user registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// The label stored with transactions the user creates.
    ///
    /// Falls back to the email address when the username is blank.
    pub fn display_label(&self) -> &str {
        if self.username.trim().is_empty() {
            &self.email
        } else {
            &self.username
        }
    }

    /// The user's workspace, or [Error::NoWorkspace] if they are still pending.
    pub fn require_workspace(&self) -> Result<WorkspaceId, Error> {
        self.workspace_id.ok_or(Error::NoWorkspace)
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                is_admin INTEGER NOT NULL DEFAULT 0,
                is_banned INTEGER NOT NULL DEFAULT 0,
                workspace_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY(workspace_id) REFERENCES workspace(id)
                    ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    Ok(())
}

/// Register a new user.
///
/// The first user to register becomes an administrator. New users start
/// without a workspace.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EmptyUsername] if `username` is blank,
/// - [Error::InvalidEmail] if `email` is not an email address,
/// - [Error::DuplicateEmail] if `email` is already registered,
/// - or [Error::SqlError] if an SQL related error occurred.
pub fn register_user(
    username: &str,
    email: &str,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<User, Error> {
    let username = username.trim();
    let email = email.trim().to_lowercase();

    if username.is_empty() {
        return Err(Error::EmptyUsername);
    }

    if !is_plausible_email(&email) {
        return Err(Error::InvalidEmail(email));
    }

    let is_admin = count_users(connection)? == 0;

    connection
        .prepare(
            "INSERT INTO user (username, email, is_admin, is_banned, workspace_id, created_at)
             VALUES (?1, ?2, ?3, 0, NULL, ?4)
             RETURNING id, username, email, is_admin, is_banned, workspace_id, created_at",
        )?
        .query_row((username, &email, is_admin, created_at), map_user_row)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateEmail,
            error => error.into(),
        })
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, email, is_admin, is_banned, workspace_id, created_at
             FROM user WHERE id = :id",
        )?
        .query_one(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get all users, newest first.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn list_users(connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare(
            "SELECT id, username, email, is_admin, is_banned, workspace_id, created_at
             FROM user ORDER BY created_at DESC, id DESC",
        )?
        .query_map([], map_user_row)?
        .map(|maybe_user| maybe_user.map_err(Error::from))
        .collect()
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| {
            let count: i64 = row.get(0)?;

            usize::try_from(count)
                .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, count))
        })
        .map_err(|error| error.into())
}

/// Assign a user to a workspace, or unassign them with `None`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user or the workspace does not exist.
pub fn set_user_workspace(
    user_id: UserId,
    workspace_id: Option<WorkspaceId>,
    connection: &Connection,
) -> Result<User, Error> {
    let rows_affected = connection
        .execute(
            "UPDATE user SET workspace_id = ?1 WHERE id = ?2",
            (workspace_id.map(|id| id.as_i64()), user_id.as_i64()),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_user_by_id(user_id, connection)
}

/// Ban or unban a user.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn set_user_banned(
    user_id: UserId,
    is_banned: bool,
    connection: &Connection,
) -> Result<User, Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET is_banned = ?1 WHERE id = ?2",
        (is_banned, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_user_by_id(user_id, connection)
}

/// Flip whether a user is an administrator.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn toggle_user_admin(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET is_admin = NOT is_admin WHERE id = ?1",
        (user_id.as_i64(),),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_user_by_id(user_id, connection)
}

/// Delete a user's record.
///
/// The user's transactions and messages are kept, they carry the author label.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn delete_user(user_id: UserId, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM user WHERE id = ?1", (user_id.as_i64(),))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let workspace_id: Option<i64> = row.get(5)?;

    Ok(User {
        id: UserId::new(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        is_admin: row.get(3)?,
        is_banned: row.get(4)?,
        workspace_id: workspace_id.map(WorkspaceId::new),
        created_at: row.get(6)?,
    })
}
