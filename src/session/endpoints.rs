//! Route handlers for the signed-in user's session.

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};

use crate::{
    AppState, Error,
    dashboard::TransactionFilter,
    session::{Clock, SlotContents, Sessions},
    transaction::SQLiteTransactionStore,
    user::User,
};

/// The state needed to open and use sessions.
#[derive(Clone)]
pub struct SessionsState {
    /// The store sessions subscribe to.
    pub store: SQLiteTransactionStore,
    /// The open sessions.
    pub sessions: Sessions,
    /// The clock new sessions compute forecasts with.
    pub clock: Clock,
}

impl FromRef<AppState> for SessionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.transaction_store.clone(),
            sessions: state.sessions.clone(),
            clock: state.clock.clone(),
        }
    }
}

/// A route handler that returns the latest report of the user's session,
/// opening the session on first use.
pub async fn get_session_endpoint(
    State(state): State<SessionsState>,
    Extension(user): Extension<User>,
) -> Result<Json<SlotContents>, Error> {
    let open = state
        .sessions
        .open_or_get(&state.store, &user, state.clock.clone())?;

    Ok(Json(open.slot.read()))
}

/// A route handler that replaces the session's filter and returns the
/// re-rendered report.
pub async fn set_filter_endpoint(
    State(state): State<SessionsState>,
    Extension(user): Extension<User>,
    Json(filter): Json<TransactionFilter>,
) -> Result<Json<SlotContents>, Error> {
    let open = state
        .sessions
        .open_or_get(&state.store, &user, state.clock.clone())?;

    open.session.set_filter(filter)?;

    Ok(Json(open.slot.read()))
}

/// A route handler that closes the user's session, e.g. on log out.
pub async fn close_session_endpoint(
    State(state): State<SessionsState>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, Error> {
    state.sessions.close(user.id)?;

    Ok(StatusCode::NO_CONTENT)
}
