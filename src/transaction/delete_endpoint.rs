use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{Error, database_id::TransactionId, session::SessionsState, user::User};

/// A route handler for deleting a transaction from the user's workspace.
///
/// Responds with 404 if the transaction does not exist or belongs to another
/// workspace.
pub async fn delete_transaction_endpoint(
    State(state): State<SessionsState>,
    Extension(user): Extension<User>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let open = state
        .sessions
        .open_or_get(&state.store, &user, state.clock.clone())?;

    open.session
        .delete_transaction(&state.store, transaction_id)
        .inspect_err(|error| {
            tracing::warn!("Could not delete transaction {transaction_id}: {error}");
        })?;

    Ok(StatusCode::NO_CONTENT)
}
