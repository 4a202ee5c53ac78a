//! Defter is a small multi-tenant bookkeeping service.
//!
//! Users register, get assigned to a workspace (a company) by an administrator,
//! and record income and expense transactions shared within that workspace.
//! Each signed-in user gets a [WorkspaceSession] that is kept current by push
//! snapshots from the transaction store and renders a [Report] with totals,
//! a category breakdown and a balance forecast.
//!
//! This library provides a JSON REST API over those sessions.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::signal;

mod app_state;
mod auth;
mod category;
mod chat;
mod customer;
mod dashboard;
mod database_id;
mod db;
mod endpoints;
mod logging;
mod routing;
mod session;
mod subscription;
mod transaction;
mod user;
mod workspace;

pub use app_state::AppState;
pub use dashboard::{
    Bucket, CategoryBreakdown, Forecast, Frequency, FrequencyStats, Report, Share, Totals,
    TransactionCache, TransactionFilter, Trend, TypeFilter,
};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use session::{Presenter, ReportSlot, WorkspaceSession};
pub use subscription::Subscription;
pub use transaction::{
    AttachmentRef, NewTransaction, SQLiteTransactionStore, Transaction, TransactionStore,
    TransactionType, ValidatedTransaction,
};
pub use user::{User, UserId};
pub use workspace::{Workspace, WorkspaceId};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The broad class an [Error] belongs to.
///
/// The class decides how an error is surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The client sent invalid input, the operation was not attempted.
    Validation,
    /// The store failed, e.g. an SQL error or a poisoned lock.
    Transport,
    /// The operation targeted something that does not exist, or the user is
    /// not linked to a workspace.
    NotFound,
    /// The user is known but not allowed to perform the operation.
    Forbidden,
    /// The request did not identify a known user.
    Unauthorized,
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A transaction was created with an empty description.
    #[error("the description cannot be empty")]
    EmptyDescription,

    /// A transaction was created with an amount of zero or less.
    ///
    /// Amounts are magnitudes, the direction comes from the transaction type.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(Decimal),

    /// A transaction was created with an amount over the per-transaction limit.
    #[error("{0} is over the largest amount accepted for a transaction")]
    AmountTooLarge(Decimal),

    /// A transaction was created with more than two decimal places.
    #[error("{0} has too many decimal places, use at most two")]
    AmountTooPrecise(Decimal),

    /// A transaction was created without choosing income or expense.
    #[error("choose whether the transaction is an income or an expense")]
    MissingTransactionType,

    /// An inline attachment was larger than the 2 MiB limit.
    #[error("the attachment is {0} bytes, which is over the size limit")]
    AttachmentTooLarge(usize),

    /// A workspace was created with an empty name.
    #[error("the workspace name cannot be empty")]
    EmptyWorkspaceName,

    /// A workspace was created with an empty code.
    #[error("the workspace code cannot be empty")]
    EmptyWorkspaceCode,

    /// A workspace with the same code already exists.
    #[error("the workspace code \"{0}\" is already in use")]
    DuplicateWorkspaceCode(String),

    /// A user tried to register with an empty username.
    #[error("the username cannot be empty")]
    EmptyUsername,

    /// A user tried to register with something that is not an email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// A user tried to register with an email that is already in use.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// A chat message was empty after trimming whitespace.
    #[error("the message cannot be empty")]
    EmptyMessage,

    /// A chat message was longer than 1000 characters.
    #[error("the message is too long")]
    MessageTooLong,

    /// An admin tried to ban, delete or change the role of their own account.
    #[error("you cannot change your own account from the admin panel")]
    SelfModification,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The user has not been assigned to a workspace yet.
    ///
    /// Workspace scoped operations are aborted instead of running against an
    /// undefined scope.
    #[error("your account has not been assigned to a workspace yet, ask an administrator")]
    NoWorkspace,

    /// Tried to delete a transaction that is not in the user's workspace.
    #[error("tried to delete a transaction that is not in the workspace")]
    DeleteMissingTransaction,

    /// The request did not carry a known user ID.
    #[error("sign in to continue")]
    Unauthenticated,

    /// The user has been banned by an administrator.
    #[error("your account has been banned")]
    Banned,

    /// A non-admin user tried to use the admin panel.
    #[error("only administrators can do this")]
    AdminOnly,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// A stored value could not be decoded, e.g. an amount that is not a decimal.
    #[error("could not read stored value: {0}")]
    CorruptValue(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Could not acquire a session lock.
    #[error("could not acquire the session lock")]
    SessionLockError,
}

impl Error {
    /// The class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyDescription
            | Error::InvalidAmount(_)
            | Error::AmountTooLarge(_)
            | Error::AmountTooPrecise(_)
            | Error::MissingTransactionType
            | Error::AttachmentTooLarge(_)
            | Error::EmptyWorkspaceName
            | Error::EmptyWorkspaceCode
            | Error::DuplicateWorkspaceCode(_)
            | Error::EmptyUsername
            | Error::InvalidEmail(_)
            | Error::DuplicateEmail
            | Error::EmptyMessage
            | Error::MessageTooLong
            | Error::SelfModification => ErrorKind::Validation,
            Error::NotFound | Error::NoWorkspace | Error::DeleteMissingTransaction => {
                ErrorKind::NotFound
            }
            Error::Banned | Error::AdminOnly => ErrorKind::Forbidden,
            Error::Unauthenticated => ErrorKind::Unauthorized,
            Error::SqlError(_)
            | Error::CorruptValue(_)
            | Error::DatabaseLockError
            | Error::SessionLockError => ErrorKind::Transport,
        }
    }

    fn status_code(&self) -> StatusCode {
        match (self, self.kind()) {
            (Error::DuplicateWorkspaceCode(_) | Error::DuplicateEmail, _) => StatusCode::CONFLICT,
            (_, ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::Forbidden) => StatusCode::FORBIDDEN,
            (_, ErrorKind::Unauthorized) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::Transport) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// The JSON body sent to the client when a request fails.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self.kind() {
            // Store errors are logged, the details are not meant for the client.
            ErrorKind::Transport => {
                tracing::error!("An unexpected error occurred: {}", self);
                "Something went wrong, check the server logs for more details.".to_owned()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
