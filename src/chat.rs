//! Workspace chat.
//!
//! Members of a workspace can post short messages that every other member
//! sees. Only the most recent messages are served.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::MessageId,
    session::Clock,
    user::{User, UserId},
    workspace::WorkspaceId,
};

/// The longest message accepted, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 1000;
/// How many of the most recent messages are returned.
pub const MESSAGE_HISTORY_LIMIT: usize = 100;

/// A message posted to a workspace's chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The ID of the message.
    pub id: MessageId,
    /// The workspace the message was posted in.
    pub workspace_id: WorkspaceId,
    /// The author.
    pub user_id: UserId,
    /// The author's display name when the message was sent.
    pub username: String,
    /// The message text.
    pub text: String,
    /// When the message was sent.
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

/// Create the chat message table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_chat_message_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS chat_message (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                text TEXT NOT NULL,
                sent_at TEXT NOT NULL,
                FOREIGN KEY(workspace_id) REFERENCES workspace(id)
                    ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Post a message from `user` to `workspace_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyMessage] if the text is blank,
/// - [Error::MessageTooLong] if the trimmed text is over [MAX_MESSAGE_LENGTH] characters,
/// - [Error::NotFound] if the workspace does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn post_message(
    workspace_id: WorkspaceId,
    user: &User,
    text: &str,
    sent_at: OffsetDateTime,
    connection: &Connection,
) -> Result<ChatMessage, Error> {
    let text = text.trim();

    if text.is_empty() {
        return Err(Error::EmptyMessage);
    }

    if text.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(Error::MessageTooLong);
    }

    connection
        .prepare(
            "INSERT INTO chat_message (workspace_id, user_id, username, text, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, workspace_id, user_id, username, text, sent_at",
        )?
        .query_row(
            (
                workspace_id.as_i64(),
                user.id.as_i64(),
                user.display_label(),
                text,
                sent_at,
            ),
            map_message_row,
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
        })
}

/// Get the latest [MESSAGE_HISTORY_LIMIT] messages of `workspace_id`, oldest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn recent_messages(
    workspace_id: WorkspaceId,
    connection: &Connection,
) -> Result<Vec<ChatMessage>, Error> {
    let mut messages = connection
        .prepare(
            "SELECT id, workspace_id, user_id, username, text, sent_at FROM chat_message
             WHERE workspace_id = ?1 ORDER BY sent_at DESC, id DESC LIMIT ?2",
        )?
        .query_map(
            (workspace_id.as_i64(), MESSAGE_HISTORY_LIMIT as i64),
            map_message_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    messages.reverse();

    Ok(messages)
}

fn map_message_row(row: &Row) -> Result<ChatMessage, rusqlite::Error> {
    Ok(ChatMessage {
        id: row.get(0)?,
        workspace_id: WorkspaceId::new(row.get(1)?),
        user_id: UserId::new(row.get(2)?),
        username: row.get(3)?,
        text: row.get(4)?,
        sent_at: row.get(5)?,
    })
}

/// The state needed for the chat endpoints.
#[derive(Clone)]
pub struct ChatState {
    /// The database connection for managing messages.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Used to timestamp new messages.
    pub clock: Clock,
}

impl FromRef<AppState> for ChatState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            clock: state.clock.clone(),
        }
    }
}

/// The JSON body for posting a message.
#[derive(Debug, Deserialize)]
pub struct MessageForm {
    /// The message text.
    pub text: String,
}

/// A route handler that returns the recent messages of the user's workspace.
pub async fn get_messages_endpoint(
    State(state): State<ChatState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<ChatMessage>>, Error> {
    let workspace_id = user.require_workspace()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    recent_messages(workspace_id, &connection).map(Json)
}

/// A route handler for posting a message to the user's workspace.
pub async fn post_message_endpoint(
    State(state): State<ChatState>,
    Extension(user): Extension<User>,
    Json(form): Json<MessageForm>,
) -> Result<(StatusCode, Json<ChatMessage>), Error> {
    let workspace_id = user.require_workspace()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let message = post_message(workspace_id, &user, &form.text, (state.clock)(), &connection)?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::{Duration, macros::datetime};

    use crate::{
        Error,
        chat::{MAX_MESSAGE_LENGTH, MESSAGE_HISTORY_LIMIT, post_message, recent_messages},
        db::initialize,
        user::{User, register_user},
        workspace::{Workspace, create_workspace},
    };

    fn setup() -> (Connection, Workspace, Workspace, User) {
        let now = datetime!(2025-01-01 0:00 UTC);
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let first = create_workspace("Acme", "ACME", now, &connection).unwrap();
        let second = create_workspace("Globex", "GLOBEX", now, &connection).unwrap();
        let user = register_user("ayse", "ayse@example.com", now, &connection).unwrap();

        (connection, first, second, user)
    }

    #[test]
    fn post_trims_and_validates() {
        let (connection, workspace, _, user) = setup();
        let now = datetime!(2025-01-01 9:00 UTC);

        let message = post_message(workspace.id, &user, "  merhaba  ", now, &connection).unwrap();

        assert_eq!(message.text, "merhaba");
        assert_eq!(message.username, "ayse");
        assert_eq!(
            post_message(workspace.id, &user, "   ", now, &connection),
            Err(Error::EmptyMessage)
        );
        assert_eq!(
            post_message(
                workspace.id,
                &user,
                &"ş".repeat(MAX_MESSAGE_LENGTH + 1),
                now,
                &connection
            ),
            Err(Error::MessageTooLong)
        );
        assert!(
            post_message(workspace.id, &user, &"ş".repeat(MAX_MESSAGE_LENGTH), now, &connection)
                .is_ok()
        );
    }

    #[test]
    fn history_is_scoped_and_limited_oldest_first() {
        let (connection, workspace, other, user) = setup();
        let start = datetime!(2025-01-01 9:00 UTC);
        for i in 0..(MESSAGE_HISTORY_LIMIT + 5) {
            let sent_at = start + Duration::minutes(i as i64);
            post_message(workspace.id, &user, &format!("#{i}"), sent_at, &connection).unwrap();
        }
        post_message(other.id, &user, "elsewhere", start, &connection).unwrap();

        let messages = recent_messages(workspace.id, &connection).unwrap();

        assert_eq!(messages.len(), MESSAGE_HISTORY_LIMIT);
        assert_eq!(messages[0].text, "#5");
        assert_eq!(
            messages.last().unwrap().text,
            format!("#{}", MESSAGE_HISTORY_LIMIT + 4)
        );
        assert!(messages.iter().all(|m| m.workspace_id == workspace.id));
    }
}
