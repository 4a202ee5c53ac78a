//! Admin route handlers for managing workspaces.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    session::{Clock, Sessions},
    workspace::{Workspace, WorkspaceId, create_workspace, delete_workspace, list_workspaces},
};

/// The state needed to manage workspaces.
#[derive(Clone)]
pub struct WorkspaceAdminState {
    /// The database connection for managing workspaces.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Sessions in a deleted workspace are closed.
    pub sessions: Sessions,
    /// Used to timestamp new workspaces.
    pub clock: Clock,
}

impl FromRef<AppState> for WorkspaceAdminState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            sessions: state.sessions.clone(),
            clock: state.clock.clone(),
        }
    }
}

/// The JSON body for creating a workspace.
#[derive(Debug, Deserialize)]
pub struct WorkspaceForm {
    /// The display name.
    pub name: String,
    /// The short code, converted to upper case.
    pub code: String,
}

/// A route handler that lists every workspace, newest first.
pub async fn list_workspaces_endpoint(
    State(state): State<WorkspaceAdminState>,
) -> Result<Json<Vec<Workspace>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    list_workspaces(&connection).map(Json)
}

/// A route handler for creating a workspace.
pub async fn create_workspace_endpoint(
    State(state): State<WorkspaceAdminState>,
    Json(form): Json<WorkspaceForm>,
) -> Result<(StatusCode, Json<Workspace>), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let workspace = create_workspace(&form.name, &form.code, (state.clock)(), &connection)?;
    tracing::info!("Created workspace {} ({})", workspace.id, workspace.code);

    Ok((StatusCode::CREATED, Json(workspace)))
}

/// A route handler for deleting a workspace and everything in it.
///
/// Members of the workspace are unassigned and their sessions closed.
pub async fn delete_workspace_endpoint(
    State(state): State<WorkspaceAdminState>,
    Path(workspace_id): Path<i64>,
) -> Result<StatusCode, Error> {
    let workspace_id = WorkspaceId::new(workspace_id);

    {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        delete_workspace(workspace_id, &connection)?;
    }

    state.sessions.close_workspace(workspace_id)?;
    tracing::info!("Deleted workspace {workspace_id}");

    Ok(StatusCode::NO_CONTENT)
}
