//! The per-user state of a signed-in workspace member.

use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::{
    Error,
    dashboard::{Report, TransactionCache, TransactionFilter, TypeFilter},
    database_id::TransactionId,
    session::Presenter,
    subscription::Subscription,
    transaction::{NewTransaction, Transaction, TransactionStore},
    user::User,
    workspace::WorkspaceId,
};

/// Supplies the current time to a session.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// A clock that reads the system time in UTC.
pub fn system_clock() -> Clock {
    Arc::new(OffsetDateTime::now_utc)
}

struct SessionState {
    cache: TransactionCache,
    filter: TransactionFilter,
    sync_error: Option<String>,
    presenter: Box<dyn Presenter>,
    clock: Clock,
}

impl SessionState {
    fn render(&mut self) -> Report {
        let report = Report::build(&self.cache, &self.filter, (self.clock)());
        self.presenter.present(&report);
        report
    }

    fn on_snapshot(&mut self, snapshot: &[Transaction]) {
        self.cache.replace(snapshot);

        if self.sync_error.take().is_some() {
            self.presenter.clear_error();
        }

        self.render();
    }

    fn on_error(&mut self, error: &Error) {
        let message = format!("Live updates stopped: {error}");
        self.presenter.present_error(&message);
        self.sync_error = Some(message);
    }
}

/// The application state of one user inside their workspace.
///
/// Opening a session subscribes to the workspace's transactions. Every
/// snapshot replaces the cache and re-runs the filter, aggregator and
/// forecaster, handing the result to the session's [Presenter]. Dropping or
/// closing the session unsubscribes.
///
/// A failed subscription keeps the last known transactions and records a
/// sync error until the next successful snapshot.
pub struct WorkspaceSession {
    user: User,
    workspace_id: WorkspaceId,
    state: Arc<Mutex<SessionState>>,
    subscription: Option<Subscription>,
}

impl WorkspaceSession {
    /// Open a session for `user` in their assigned workspace.
    ///
    /// The initial snapshot is loaded and presented before this returns.
    ///
    /// # Errors
    /// Returns [Error::NoWorkspace] if the user has not been assigned to a workspace.
    pub fn open(
        store: &dyn TransactionStore,
        user: User,
        presenter: Box<dyn Presenter>,
        clock: Clock,
    ) -> Result<Self, Error> {
        let workspace_id = user.require_workspace()?;

        let state = Arc::new(Mutex::new(SessionState {
            cache: TransactionCache::new(),
            filter: TransactionFilter::default(),
            sync_error: None,
            presenter,
            clock,
        }));

        let snapshot_state = state.clone();
        let error_state = state.clone();

        // The callbacks lock the session state, so it must not be held here.
        let subscription = store.subscribe(
            workspace_id,
            Box::new(move |snapshot: &[Transaction]| {
                lock_or_log(&snapshot_state, |state| state.on_snapshot(snapshot));
            }),
            Box::new(move |error: &Error| {
                lock_or_log(&error_state, |state| state.on_error(error));
            }),
        );

        tracing::info!("Opened session for user {} in workspace {workspace_id}", user.id);

        Ok(Self {
            user,
            workspace_id,
            state,
            subscription: Some(subscription),
        })
    }

    /// The user the session belongs to.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The workspace every operation of this session is scoped to.
    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// The current filter.
    pub fn filter(&self) -> Result<TransactionFilter, Error> {
        Ok(self.lock()?.filter.clone())
    }

    /// The message of the current sync error, if the subscription failed.
    pub fn sync_error(&self) -> Result<Option<String>, Error> {
        Ok(self.lock()?.sync_error.clone())
    }

    /// Replace the filter and re-render.
    pub fn set_filter(&self, filter: TransactionFilter) -> Result<Report, Error> {
        let mut state = self.lock()?;
        state.filter = filter;
        Ok(state.render())
    }

    /// Change the search term and re-render.
    pub fn set_search_term(&self, search: &str) -> Result<Report, Error> {
        let mut state = self.lock()?;
        state.filter.search = search.to_owned();
        Ok(state.render())
    }

    /// Change the type selector and re-render.
    pub fn set_type_filter(&self, type_filter: TypeFilter) -> Result<Report, Error> {
        let mut state = self.lock()?;
        state.filter.type_filter = type_filter;
        Ok(state.render())
    }

    /// Compute a report from the current cache without presenting it.
    pub fn report(&self) -> Result<Report, Error> {
        let state = self.lock()?;
        Ok(Report::build(&state.cache, &state.filter, (state.clock)()))
    }

    /// Start a new transaction in this session's workspace.
    ///
    /// The author is set to the session user and the date to now, either can
    /// be overridden with the builder.
    pub fn new_transaction(
        &self,
        amount: Decimal,
        description: &str,
    ) -> Result<NewTransaction, Error> {
        let now = (self.lock()?.clock)();

        Ok(Transaction::build(self.workspace_id, amount, description)
            .added_by(self.user.display_label())
            .date(now))
    }

    /// Validate and store a transaction in this session's workspace.
    ///
    /// The cache is not touched, it changes when the store publishes the
    /// next snapshot.
    ///
    /// # Errors
    /// Returns a validation error without writing anything if the transaction
    /// is invalid, or the store's error if the write failed.
    pub fn create_transaction(
        &self,
        store: &dyn TransactionStore,
        mut transaction: NewTransaction,
    ) -> Result<Transaction, Error> {
        transaction.workspace_id = self.workspace_id;

        store.create(transaction).inspect_err(|error| {
            tracing::warn!(
                "User {} could not create a transaction: {error}",
                self.user.id
            );
        })
    }

    /// Delete a transaction from this session's workspace.
    ///
    /// # Errors
    /// Returns [Error::DeleteMissingTransaction] if the transaction is not in
    /// the workspace.
    pub fn delete_transaction(
        &self,
        store: &dyn TransactionStore,
        id: TransactionId,
    ) -> Result<(), Error> {
        store.delete(self.workspace_id, id)
    }

    /// Unsubscribe and discard the session.
    pub fn close(mut self) {
        self.unsubscribe();
    }

    fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            tracing::info!(
                "Closed session for user {} in workspace {}",
                self.user.id,
                self.workspace_id
            );
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, Error> {
        self.state.lock().map_err(|error| {
            tracing::error!("could not acquire session lock: {error}");
            Error::SessionLockError
        })
    }
}

impl Drop for WorkspaceSession {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for WorkspaceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSession")
            .field("user", &self.user.id)
            .field("workspace_id", &self.workspace_id)
            .finish_non_exhaustive()
    }
}

fn lock_or_log(state: &Mutex<SessionState>, callback: impl FnOnce(&mut SessionState)) {
    match state.lock() {
        Ok(mut state) => callback(&mut state),
        Err(error) => tracing::error!("Dropped snapshot, could not acquire session lock: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use time::{OffsetDateTime, macros::datetime};

    use crate::{
        Error,
        dashboard::{TransactionFilter, TypeFilter},
        db::initialize,
        session::{Clock, Presenter, ReportSlot, WorkspaceSession},
        subscription::{ErrorCallback, SnapshotCallback, Subscription},
        transaction::{
            NewTransaction, SQLiteTransactionStore, Transaction, TransactionStore, TransactionType,
        },
        user::{User, UserId, register_user, set_user_workspace},
        workspace::{WorkspaceId, create_workspace},
    };

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn fixed_clock() -> Clock {
        Arc::new(|| NOW)
    }

    fn setup() -> (SQLiteTransactionStore, User) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let workspace = create_workspace("Acme", "ACME", NOW, &connection).unwrap();
        let user = register_user("ayse", "ayse@example.com", NOW, &connection).unwrap();
        let user = set_user_workspace(user.id, Some(workspace.id), &connection).unwrap();

        (
            SQLiteTransactionStore::new(Arc::new(Mutex::new(connection))),
            user,
        )
    }

    fn open(store: &SQLiteTransactionStore, user: User) -> (WorkspaceSession, ReportSlot) {
        let slot = ReportSlot::new();
        let session =
            WorkspaceSession::open(store, user, Box::new(slot.clone()), fixed_clock()).unwrap();

        (session, slot)
    }

    #[test]
    fn open_fails_without_workspace() {
        let (store, mut user) = setup();
        user.workspace_id = None;

        let result =
            WorkspaceSession::open(&store, user, Box::new(ReportSlot::new()), fixed_clock());

        assert_eq!(result.err(), Some(Error::NoWorkspace));
    }

    #[test]
    fn open_presents_initial_snapshot() {
        let (store, user) = setup();

        let (_session, slot) = open(&store, user);

        let contents = slot.read();
        assert_eq!(contents.revision, 1);
        assert_eq!(contents.report.unwrap().transactions, vec![]);
    }

    #[test]
    fn create_is_stamped_and_arrives_via_snapshot() {
        let (store, user) = setup();
        let (session, slot) = open(&store, user);

        let new_transaction = session
            .new_transaction(dec!(100), "Ocak maaşı")
            .unwrap()
            .transaction_type(TransactionType::Income);
        let created = session.create_transaction(&store, new_transaction).unwrap();

        assert_eq!(created.added_by.as_deref(), Some("ayse"));
        assert_eq!(created.date, Some(NOW));
        let report = slot.read().report.unwrap();
        assert_eq!(report.transactions, vec![created]);
        assert_eq!(report.totals.total_income, dec!(100));
    }

    #[test]
    fn create_is_forced_into_session_workspace() {
        let (store, user) = setup();
        let (session, _slot) = open(&store, user);

        let foreign = Transaction::build(WorkspaceId::new(999), dec!(5), "Çay")
            .transaction_type(TransactionType::Expense);
        let created = session.create_transaction(&store, foreign).unwrap();

        assert_eq!(created.workspace_id, session.workspace_id());
    }

    #[test]
    fn failed_create_leaves_cache_unchanged() {
        let (store, user) = setup();
        let (session, slot) = open(&store, user);

        let result = session.create_transaction(
            &store,
            session.new_transaction(dec!(0), "Boş").unwrap(),
        );

        assert_eq!(result, Err(Error::InvalidAmount(dec!(0))));
        assert_eq!(slot.read().revision, 1);
        assert!(session.report().unwrap().transactions.is_empty());
    }

    #[test]
    fn filter_changes_rerender_current_cache() {
        let (store, user) = setup();
        let (session, slot) = open(&store, user);
        for (amount, description, transaction_type) in [
            (dec!(100), "Maaş", TransactionType::Income),
            (dec!(30), "Market", TransactionType::Expense),
        ] {
            let new_transaction = session
                .new_transaction(amount, description)
                .unwrap()
                .transaction_type(transaction_type);
            session.create_transaction(&store, new_transaction).unwrap();
        }

        session.set_type_filter(TypeFilter::Expense).unwrap();
        let report = slot.read().report.unwrap();
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.totals.net, dec!(70));

        session.set_search_term("yok").unwrap();
        assert!(slot.read().report.unwrap().transactions.is_empty());

        session.set_filter(TransactionFilter::default()).unwrap();
        assert_eq!(slot.read().report.unwrap().transactions.len(), 2);
        assert_eq!(session.filter().unwrap(), TransactionFilter::default());
    }

    #[test]
    fn delete_is_scoped_to_session_workspace() {
        let (store, user) = setup();
        let (session, slot) = open(&store, user);
        let new_transaction = session
            .new_transaction(dec!(30), "Market")
            .unwrap()
            .transaction_type(TransactionType::Expense);
        let created = session.create_transaction(&store, new_transaction).unwrap();

        assert_eq!(
            session.delete_transaction(&store, created.id + 1),
            Err(Error::DeleteMissingTransaction)
        );
        session.delete_transaction(&store, created.id).unwrap();

        assert!(slot.read().report.unwrap().transactions.is_empty());
    }

    #[test]
    fn close_unsubscribes() {
        let (store, user) = setup();
        let (session, _slot) = open(&store, user);
        let workspace_id = session.workspace_id();
        assert_eq!(store.subscriber_count(workspace_id), 1);

        session.close();

        assert_eq!(store.subscriber_count(workspace_id), 0);
    }

    /// A store whose subscription fails after delivering one snapshot.
    struct FlakyStore {
        errors: Arc<Mutex<Option<ErrorCallback>>>,
        snapshots: Arc<Mutex<Option<SnapshotCallback<Transaction>>>>,
        initial: Vec<Transaction>,
    }

    impl TransactionStore for FlakyStore {
        fn subscribe(
            &self,
            _workspace_id: WorkspaceId,
            mut on_snapshot: SnapshotCallback<Transaction>,
            on_error: ErrorCallback,
        ) -> Subscription {
            on_snapshot(&self.initial);
            *self.snapshots.lock().unwrap() = Some(on_snapshot);
            *self.errors.lock().unwrap() = Some(on_error);

            crate::subscription::ListenerRegistry::<Transaction>::new().register(
                WorkspaceId::new(0),
                || Ok(vec![]),
                Box::new(|_: &[Transaction]| {}),
                Box::new(|_: &Error| {}),
            )
        }

        fn create(&self, _transaction: NewTransaction) -> Result<Transaction, Error> {
            Err(Error::DatabaseLockError)
        }

        fn delete(&self, _workspace_id: WorkspaceId, _id: i64) -> Result<(), Error> {
            Err(Error::DatabaseLockError)
        }

        fn snapshot(&self, _workspace_id: WorkspaceId) -> Result<Vec<Transaction>, Error> {
            Ok(self.initial.clone())
        }
    }

    #[test]
    fn subscription_error_keeps_cache_until_next_snapshot() {
        let (_, user) = setup();
        let initial = vec![Transaction {
            id: 1,
            workspace_id: user.workspace_id.unwrap(),
            description: "Kira".to_owned(),
            amount: dec!(500),
            transaction_type: TransactionType::Expense,
            category: Some("Kira".to_owned()),
            date: Some(NOW),
            added_by: None,
            attachment: None,
        }];
        let store = FlakyStore {
            errors: Default::default(),
            snapshots: Default::default(),
            initial: initial.clone(),
        };
        let slot = ReportSlot::new();
        let session =
            WorkspaceSession::open(&store, user, Box::new(slot.clone()), fixed_clock()).unwrap();

        (store.errors.lock().unwrap().as_mut().unwrap())(&Error::DatabaseLockError);

        let contents = slot.read();
        assert!(contents.error.is_some());
        assert_eq!(contents.report.unwrap().transactions, initial);
        assert!(session.sync_error().unwrap().is_some());

        (store.snapshots.lock().unwrap().as_mut().unwrap())(&[]);

        assert_eq!(slot.read().error, None);
        assert_eq!(session.sync_error().unwrap(), None);
        assert!(session.report().unwrap().transactions.is_empty());
    }

    #[test]
    fn presenter_receives_every_render() {
        struct Counter(Arc<Mutex<usize>>);

        impl Presenter for Counter {
            fn present(&mut self, _report: &crate::dashboard::Report) {
                *self.0.lock().unwrap() += 1;
            }

            fn present_error(&mut self, _message: &str) {}
        }

        let (store, user) = setup();
        let count = Arc::new(Mutex::new(0));
        let session = WorkspaceSession::open(
            &store,
            user,
            Box::new(Counter(count.clone())),
            fixed_clock(),
        )
        .unwrap();

        session.set_search_term("a").unwrap();

        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(session.user().id, UserId::new(1));
    }
}
