//! Sets up the application's SQLite database.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error, category::create_category_settings_table, chat::create_chat_message_table,
    transaction::create_transaction_table, user::create_user_table,
    workspace::create_workspace_table,
};

/// Create the application's tables if they do not exist.
///
/// Foreign keys are enabled on `connection` so that deleting a workspace
/// cascades to its transactions, category settings and chat messages.
///
/// # Errors
/// Returns an [Error::SqlError] if any table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Has no effect inside a transaction, so it must be set first.
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_workspace_table(&transaction)?;
    create_user_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_category_settings_table(&transaction)?;
    create_chat_message_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
