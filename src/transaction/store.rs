//! Defines the transaction store trait and its SQLite implementation.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    database_id::TransactionId,
    subscription::{ErrorCallback, ListenerRegistry, SnapshotCallback, Subscription},
    transaction::{
        NewTransaction, Transaction,
        core::{delete_transaction, insert_transaction, list_transactions},
    },
    workspace::WorkspaceId,
};

/// Handles the creation, deletion and live retrieval of transactions.
///
/// Every operation is scoped to a single workspace. After each successful
/// write the store pushes the full, current set of transactions for the
/// affected workspace to its subscribers.
pub trait TransactionStore: Send + Sync {
    /// Subscribe to snapshots of `workspace_id`.
    ///
    /// The current snapshot is delivered to `on_snapshot` before this returns.
    /// If the store cannot load a snapshot, `on_error` is called instead.
    fn subscribe(
        &self,
        workspace_id: WorkspaceId,
        on_snapshot: SnapshotCallback<Transaction>,
        on_error: ErrorCallback,
    ) -> Subscription;

    /// Validate and store a new transaction.
    ///
    /// # Errors
    /// Returns a validation error if `transaction` is invalid, in which case
    /// nothing is written, or a transport error if the write failed.
    fn create(&self, transaction: NewTransaction) -> Result<Transaction, Error>;

    /// Delete the transaction `id` from `workspace_id`.
    ///
    /// # Errors
    /// Returns [Error::DeleteMissingTransaction] if the transaction is not in
    /// the workspace.
    fn delete(&self, workspace_id: WorkspaceId, id: TransactionId) -> Result<(), Error>;

    /// Get the current set of transactions in `workspace_id`.
    fn snapshot(&self, workspace_id: WorkspaceId) -> Result<Vec<Transaction>, Error>;
}

/// Stores transactions in a SQLite database.
///
/// The `workspace` table must exist, see [crate::initialize_db].
#[derive(Clone)]
pub struct SQLiteTransactionStore {
    connection: Arc<Mutex<Connection>>,
    listeners: ListenerRegistry<Transaction>,
}

impl SQLiteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            connection,
            listeners: ListenerRegistry::new(),
        }
    }

    /// The number of live subscriptions to `workspace_id`.
    pub fn subscriber_count(&self, workspace_id: WorkspaceId) -> usize {
        self.listeners.listener_count(workspace_id)
    }

    fn load_snapshot(
        connection: &Mutex<Connection>,
        workspace_id: WorkspaceId,
    ) -> Result<Vec<Transaction>, Error> {
        let connection = connection.lock().map_err(|_| Error::DatabaseLockError)?;

        list_transactions(workspace_id, &connection)
    }

    // Must be called without the connection lock held.
    fn publish(&self, workspace_id: WorkspaceId) {
        self.listeners.publish(workspace_id, || {
            Self::load_snapshot(&self.connection, workspace_id)
        });
    }
}

impl std::fmt::Debug for SQLiteTransactionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SQLiteTransactionStore").finish_non_exhaustive()
    }
}

impl TransactionStore for SQLiteTransactionStore {
    fn subscribe(
        &self,
        workspace_id: WorkspaceId,
        on_snapshot: SnapshotCallback<Transaction>,
        on_error: ErrorCallback,
    ) -> Subscription {
        let connection = self.connection.clone();

        self.listeners.register(
            workspace_id,
            move || Self::load_snapshot(&connection, workspace_id),
            on_snapshot,
            on_error,
        )
    }

    /// Create a new transaction in the database.
    ///
    /// # Errors
    /// This function will return a:
    /// - validation error if `transaction` fails [NewTransaction::validate],
    /// - [Error::NotFound] if the workspace does not exist,
    /// - [Error::DatabaseLockError] if the database lock is poisoned,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn create(&self, transaction: NewTransaction) -> Result<Transaction, Error> {
        let transaction = transaction.validate()?;
        let workspace_id = transaction.workspace_id();

        let created = {
            let connection = self
                .connection
                .lock()
                .map_err(|_| Error::DatabaseLockError)?;

            insert_transaction(transaction, &connection)?
        };

        tracing::info!(
            "Created transaction {} in workspace {workspace_id}",
            created.id
        );
        self.publish(workspace_id);

        Ok(created)
    }

    fn delete(&self, workspace_id: WorkspaceId, id: TransactionId) -> Result<(), Error> {
        {
            let connection = self
                .connection
                .lock()
                .map_err(|_| Error::DatabaseLockError)?;

            delete_transaction(workspace_id, id, &connection)?;
        }

        tracing::info!("Deleted transaction {id} from workspace {workspace_id}");
        self.publish(workspace_id);

        Ok(())
    }

    fn snapshot(&self, workspace_id: WorkspaceId) -> Result<Vec<Transaction>, Error> {
        Self::load_snapshot(&self.connection, workspace_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    use crate::{
        Error,
        db::initialize,
        transaction::{SQLiteTransactionStore, Transaction, TransactionStore, TransactionType},
        workspace::{Workspace, create_workspace},
    };

    type Snapshots = Arc<Mutex<Vec<Vec<Transaction>>>>;

    fn get_store() -> (SQLiteTransactionStore, Workspace, Workspace) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let now = datetime!(2025-01-01 0:00 UTC);
        let first = create_workspace("Acme", "ACME", now, &connection).unwrap();
        let second = create_workspace("Globex", "GLOBEX", now, &connection).unwrap();

        (
            SQLiteTransactionStore::new(Arc::new(Mutex::new(connection))),
            first,
            second,
        )
    }

    fn record(snapshots: &Snapshots) -> Box<dyn FnMut(&[Transaction]) + Send> {
        let snapshots = snapshots.clone();
        Box::new(move |snapshot: &[Transaction]| {
            snapshots.lock().unwrap().push(snapshot.to_vec())
        })
    }

    #[test]
    fn subscribe_delivers_initial_snapshot() {
        let (store, workspace, _) = get_store();
        let existing = store
            .create(
                Transaction::build(workspace.id, dec!(100), "Maaş")
                    .transaction_type(TransactionType::Income),
            )
            .unwrap();
        let snapshots = Snapshots::default();

        let _subscription =
            store.subscribe(workspace.id, record(&snapshots), Box::new(|_: &Error| {}));

        assert_eq!(*snapshots.lock().unwrap(), vec![vec![existing]]);
    }

    #[test]
    fn create_publishes_to_same_workspace_only() {
        let (store, workspace, other) = get_store();
        let ours = Snapshots::default();
        let theirs = Snapshots::default();
        let _ours =
            store.subscribe(workspace.id, record(&ours), Box::new(|_: &Error| {}));
        let _theirs =
            store.subscribe(other.id, record(&theirs), Box::new(|_: &Error| {}));

        let created = store
            .create(
                Transaction::build(workspace.id, dec!(40), "Market")
                    .transaction_type(TransactionType::Expense),
            )
            .unwrap();

        assert_eq!(*ours.lock().unwrap(), vec![vec![], vec![created]]);
        assert_eq!(theirs.lock().unwrap().len(), 1);
    }

    #[test]
    fn invalid_create_writes_nothing_and_publishes_nothing() {
        let (store, workspace, _) = get_store();
        let snapshots = Snapshots::default();
        let _subscription =
            store.subscribe(workspace.id, record(&snapshots), Box::new(|_: &Error| {}));

        let result = store.create(Transaction::build(workspace.id, dec!(0), "Market"));

        assert_eq!(result, Err(Error::InvalidAmount(dec!(0))));
        assert_eq!(snapshots.lock().unwrap().len(), 1);
        assert_eq!(store.snapshot(workspace.id), Ok(vec![]));
    }

    #[test]
    fn delete_publishes_and_rejects_foreign_ids() {
        let (store, workspace, other) = get_store();
        let created = store
            .create(
                Transaction::build(workspace.id, dec!(40), "Market")
                    .transaction_type(TransactionType::Expense),
            )
            .unwrap();
        let snapshots = Snapshots::default();
        let _subscription =
            store.subscribe(workspace.id, record(&snapshots), Box::new(|_: &Error| {}));

        assert_eq!(
            store.delete(other.id, created.id),
            Err(Error::DeleteMissingTransaction)
        );
        store.delete(workspace.id, created.id).unwrap();

        assert_eq!(
            *snapshots.lock().unwrap(),
            vec![vec![created], vec![]]
        );
    }

    #[test]
    fn dropped_subscription_is_removed() {
        let (store, workspace, _) = get_store();

        let subscription = store.subscribe(
            workspace.id,
            Box::new(|_: &[Transaction]| {}),
            Box::new(|_: &Error| {}),
        );
        assert_eq!(store.subscriber_count(workspace.id), 1);

        drop(subscription);

        assert_eq!(store.subscriber_count(workspace.id), 0);
    }

    #[test]
    fn concurrent_creates_deliver_the_latest_snapshot_last() {
        let (store, workspace, _) = get_store();
        let snapshots = Snapshots::default();
        let _subscription =
            store.subscribe(workspace.id, record(&snapshots), Box::new(|_: &Error| {}));

        let writers: Vec<_> = (1..=8)
            .map(|writer| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for amount in 1..=5 {
                        store
                            .create(
                                Transaction::build(
                                    workspace.id,
                                    Decimal::from(writer * 10 + amount),
                                    "Market",
                                )
                                .transaction_type(TransactionType::Expense),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let snapshots = snapshots.lock().unwrap();
        let lengths: Vec<_> = snapshots.iter().map(Vec::len).collect();
        assert_eq!(snapshots.len(), 41);
        assert!(lengths.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(snapshots.last(), Some(&store.snapshot(workspace.id).unwrap()));
        assert_eq!(snapshots.last().map(Vec::len), Some(40));
    }
}
