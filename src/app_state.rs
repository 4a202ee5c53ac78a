//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    db::initialize,
    session::{Clock, Sessions, system_clock},
    transaction::SQLiteTransactionStore,
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The transaction store, sharing `db_connection`.
    pub transaction_store: SQLiteTransactionStore,

    /// The open workspace sessions, one per signed-in user.
    pub sessions: Sessions,

    /// The source of the current time for forecasts and new records.
    pub clock: Clock,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            transaction_store: SQLiteTransactionStore::new(connection.clone()),
            db_connection: connection,
            sessions: Sessions::new(),
            clock: system_clock(),
        })
    }

    /// Replace the clock, e.g. with a fixed time in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("transaction_store", &self.transaction_store)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
