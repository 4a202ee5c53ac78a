//! Per-workspace category vocabulary.
//!
//! Each workspace has an ordered list of category names that clients offer
//! when recording a transaction. The list is created with a starter set the
//! first time it is read.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::{Connection, OptionalExtension};

use crate::{AppState, Error, user::User, workspace::WorkspaceId};

/// The categories a new workspace starts with.
pub const DEFAULT_CATEGORIES: [&str; 6] =
    ["Gıda", "Kira", "Faturalar", "Maaş", "Ulaşım", "Diğer"];

/// Create the category settings table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_settings_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category_settings (
                workspace_id INTEGER PRIMARY KEY,
                categories TEXT NOT NULL,
                FOREIGN KEY(workspace_id) REFERENCES workspace(id)
                    ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Get the categories of `workspace_id`, storing the starter set on first access.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the workspace does not exist,
/// - [Error::CorruptValue] if the stored list cannot be decoded,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_categories(
    workspace_id: WorkspaceId,
    connection: &Connection,
) -> Result<Vec<String>, Error> {
    let stored: Option<String> = connection
        .query_row(
            "SELECT categories FROM category_settings WHERE workspace_id = ?1",
            (workspace_id.as_i64(),),
            |row| row.get(0),
        )
        .optional()?;

    match stored {
        Some(json) => serde_json::from_str(&json).map_err(|error| {
            tracing::error!("Invalid category list for workspace {workspace_id}: {error}");
            Error::CorruptValue(error.to_string())
        }),
        None => {
            let defaults: Vec<String> = DEFAULT_CATEGORIES.iter().map(|&c| c.to_owned()).collect();
            save_categories(workspace_id, &defaults, connection)?;
            Ok(defaults)
        }
    }
}

/// Replace the categories of `workspace_id`.
///
/// Names are trimmed, blank names are dropped and later duplicates (ignoring
/// case) are removed. Returns the list as stored.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the workspace does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_categories(
    workspace_id: WorkspaceId,
    categories: &[String],
    connection: &Connection,
) -> Result<Vec<String>, Error> {
    let categories = normalize(categories);
    save_categories(workspace_id, &categories, connection)?;

    Ok(categories)
}

fn normalize(categories: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut normalized = Vec::new();

    for category in categories.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        let key = category.to_lowercase();

        if !seen.contains(&key) {
            seen.push(key);
            normalized.push(category.to_owned());
        }
    }

    normalized
}

fn save_categories(
    workspace_id: WorkspaceId,
    categories: &[String],
    connection: &Connection,
) -> Result<(), Error> {
    let json = serde_json::to_string(categories)
        .map_err(|error| Error::CorruptValue(error.to_string()))?;

    connection
        .execute(
            "INSERT INTO category_settings (workspace_id, categories) VALUES (?1, ?2)
             ON CONFLICT(workspace_id) DO UPDATE SET categories = excluded.categories",
            (workspace_id.as_i64(), json),
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

    Ok(())
}

/// The state needed to read and update category settings.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns the categories of the user's workspace.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<String>>, Error> {
    let workspace_id = user.require_workspace()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_categories(workspace_id, &connection).map(Json)
}

/// A route handler that replaces the categories of the user's workspace.
pub async fn set_categories_endpoint(
    State(state): State<CategoryState>,
    Extension(user): Extension<User>,
    Json(categories): Json<Vec<String>>,
) -> Result<Json<Vec<String>>, Error> {
    let workspace_id = user.require_workspace()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = set_categories(workspace_id, &categories, &connection)?;
    tracing::info!(
        "User {} updated the categories of workspace {workspace_id}",
        user.id
    );

    Ok(Json(categories))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error,
        category::{DEFAULT_CATEGORIES, get_categories, set_categories},
        db::initialize,
        workspace::{Workspace, WorkspaceId, create_workspace, delete_workspace},
    };

    fn get_test_connection() -> (Connection, Workspace) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let workspace =
            create_workspace("Acme", "ACME", datetime!(2025-01-01 0:00 UTC), &connection)
                .unwrap();

        (connection, workspace)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|&value| value.to_owned()).collect()
    }

    #[test]
    fn first_read_returns_starter_set() {
        let (connection, workspace) = get_test_connection();

        let categories = get_categories(workspace.id, &connection).unwrap();

        assert_eq!(categories, strings(&DEFAULT_CATEGORIES));
    }

    #[test]
    fn set_normalizes_and_persists() {
        let (connection, workspace) = get_test_connection();

        let stored = set_categories(
            workspace.id,
            &strings(&["  Kira ", "", "kira", "Yakıt", "   "]),
            &connection,
        )
        .unwrap();

        assert_eq!(stored, strings(&["Kira", "Yakıt"]));
        assert_eq!(get_categories(workspace.id, &connection).unwrap(), stored);
    }

    #[test]
    fn empty_list_is_kept() {
        let (connection, workspace) = get_test_connection();

        set_categories(workspace.id, &[], &connection).unwrap();

        assert!(get_categories(workspace.id, &connection).unwrap().is_empty());
    }

    #[test]
    fn missing_workspace_is_not_found() {
        let (connection, _) = get_test_connection();

        assert_eq!(
            get_categories(WorkspaceId::new(42), &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn deleted_with_workspace() {
        let (connection, workspace) = get_test_connection();
        set_categories(workspace.id, &strings(&["Kira"]), &connection).unwrap();

        delete_workspace(workspace.id, &connection).unwrap();

        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM category_settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
