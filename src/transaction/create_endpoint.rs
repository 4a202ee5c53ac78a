//! Defines the endpoint for creating a new transaction.

use axum::{Extension, Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    session::SessionsState,
    transaction::{AttachmentRef, Transaction, TransactionType},
    user::User,
};

/// The JSON body for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct TransactionForm {
    /// Text detailing the transaction.
    pub description: String,
    /// The magnitude of the transaction, as a number or a string.
    pub amount: Decimal,
    /// Income or expense.
    #[serde(rename = "type", default)]
    pub transaction_type: Option<TransactionType>,
    /// The category label.
    #[serde(default)]
    pub category: Option<String>,
    /// When the transaction happened, defaults to now.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    /// A receipt URL or `data:` URI.
    #[serde(default)]
    pub attachment: Option<String>,
}

/// A route handler for creating a new transaction in the user's workspace.
///
/// Responds with the created transaction. The user's session report is
/// updated by the store's snapshot before this returns.
pub async fn create_transaction_endpoint(
    State(state): State<SessionsState>,
    Extension(user): Extension<User>,
    Json(form): Json<TransactionForm>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let open = state
        .sessions
        .open_or_get(&state.store, &user, state.clock.clone())?;
    let session = &open.session;

    let mut transaction = session
        .new_transaction(form.amount, &form.description)?
        .attachment(form.attachment.as_deref().and_then(AttachmentRef::parse));

    if let Some(transaction_type) = form.transaction_type {
        transaction = transaction.transaction_type(transaction_type);
    }

    if let Some(category) = &form.category {
        transaction = transaction.category(category);
    }

    if let Some(date) = form.date {
        transaction = transaction.date(date);
    }

    let created = session.create_transaction(&state.store, transaction)?;

    Ok((StatusCode::CREATED, Json(created)))
}
