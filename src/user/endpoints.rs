//! Route handlers for registering users and for the admin user panel.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    session::{Clock, Sessions},
    user::{
        User, UserId, delete_user, list_users, register_user, set_user_banned, set_user_workspace,
        toggle_user_admin,
    },
    workspace::WorkspaceId,
};

/// The state needed to register and manage users.
#[derive(Clone)]
pub struct UserState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Sessions of users whose account changed are closed.
    pub sessions: Sessions,
    /// Used to timestamp new users.
    pub clock: Clock,
}

impl FromRef<AppState> for UserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            sessions: state.sessions.clone(),
            clock: state.clock.clone(),
        }
    }
}

/// The JSON body for registering a user.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    /// The name shown to other workspace members.
    pub username: String,
    /// The user's email address.
    pub email: String,
}

/// The JSON body for assigning a user to a workspace.
#[derive(Debug, Deserialize)]
pub struct AssignWorkspaceForm {
    /// The workspace to assign the user to, or `null` to unassign them.
    pub workspace_id: Option<i64>,
}

/// A route handler for registering a new user.
///
/// New users wait for an administrator to assign them to a workspace.
pub async fn register_user_endpoint(
    State(state): State<UserState>,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<User>), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = register_user(&form.username, &form.email, (state.clock)(), &connection)?;
    tracing::info!("Registered user {} (admin: {})", user.id, user.is_admin);

    Ok((StatusCode::CREATED, Json(user)))
}

/// A route handler that lists every user, newest first.
pub async fn list_users_endpoint(
    State(state): State<UserState>,
) -> Result<Json<Vec<User>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    list_users(&connection).map(Json)
}

/// A route handler for assigning a user to a workspace.
pub async fn assign_workspace_endpoint(
    State(state): State<UserState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<i64>,
    Json(form): Json<AssignWorkspaceForm>,
) -> Result<Json<User>, Error> {
    let user_id = UserId::new(user_id);
    let workspace_id = form.workspace_id.map(WorkspaceId::new);

    let user = with_connection(&state, |connection| {
        set_user_workspace(user_id, workspace_id, connection)
    })?;

    state.sessions.close_user(user_id)?;
    tracing::info!(
        "Admin {} assigned user {user_id} to workspace {workspace_id:?}",
        admin.id
    );

    Ok(Json(user))
}

/// A route handler for banning a user.
pub async fn ban_user_endpoint(
    State(state): State<UserState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, Error> {
    let user_id = checked_target(&admin, user_id)?;

    let user = with_connection(&state, |connection| {
        set_user_banned(user_id, true, connection)
    })?;

    state.sessions.close_user(user_id)?;
    tracing::info!("Admin {} banned user {user_id}", admin.id);

    Ok(Json(user))
}

/// A route handler for lifting a user's ban.
pub async fn unban_user_endpoint(
    State(state): State<UserState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, Error> {
    let user_id = checked_target(&admin, user_id)?;

    let user = with_connection(&state, |connection| {
        set_user_banned(user_id, false, connection)
    })?;

    tracing::info!("Admin {} unbanned user {user_id}", admin.id);

    Ok(Json(user))
}

/// A route handler for granting or revoking admin rights.
pub async fn toggle_admin_endpoint(
    State(state): State<UserState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, Error> {
    let user_id = checked_target(&admin, user_id)?;

    let user = with_connection(&state, |connection| toggle_user_admin(user_id, connection))?;

    tracing::info!(
        "Admin {} set admin rights of user {user_id} to {}",
        admin.id,
        user.is_admin
    );

    Ok(Json(user))
}

/// A route handler for deleting a user.
pub async fn delete_user_endpoint(
    State(state): State<UserState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, Error> {
    let user_id = checked_target(&admin, user_id)?;

    with_connection(&state, |connection| delete_user(user_id, connection))?;

    state.sessions.close_user(user_id)?;
    tracing::info!("Admin {} deleted user {user_id}", admin.id);

    Ok(StatusCode::NO_CONTENT)
}

fn checked_target(admin: &User, user_id: i64) -> Result<UserId, Error> {
    let user_id = UserId::new(user_id);

    if user_id == admin.id {
        return Err(Error::SelfModification);
    }

    Ok(user_id)
}

fn with_connection<T>(
    state: &UserState,
    query: impl FnOnce(&Connection) -> Result<T, Error>,
) -> Result<T, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    query(&connection)
}
