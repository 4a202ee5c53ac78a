//! Middleware that resolves the requesting user and guards the admin routes.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    user::{User, UserId, get_user_by_id},
};

/// The header carrying the ID of the authenticated user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The state needed for the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Middleware function that resolves the `X-User-Id` header to a [User].
///
/// The user is placed into the request extensions and the request executed
/// normally if the user exists and is not banned. Otherwise a 401 or 403
/// response is returned.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(user): Extension<User>` to receive the user.
pub async fn auth_guard(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(error) => {
            tracing::debug!("Rejected request to {}: {error}", request.uri().path());
            error.into_response()
        }
    }
}

/// Middleware function that only lets administrators through.
///
/// **Note**: Must run after [auth_guard].
pub async fn admin_guard(
    Extension(user): Extension<User>,
    request: Request,
    next: Next,
) -> Response {
    if !user.is_admin {
        tracing::warn!("User {} tried to access {}", user.id, request.uri().path());
        return Error::AdminOnly.into_response();
    }

    next.run(request).await
}

fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<User, Error> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(UserId::new)
        .ok_or(Error::Unauthenticated)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection).map_err(|error| match error {
        Error::NotFound => Error::Unauthenticated,
        error => error,
    })?;

    if user.is_banned {
        return Err(Error::Banned);
    }

    Ok(user)
}
