//! Push subscriptions for workspace snapshots.
//!
//! A store keeps a [ListenerRegistry] and publishes the full, current set of
//! records for a workspace after every write to it. Subscribers get the
//! initial snapshot synchronously when they register and then every later
//! snapshot until their [Subscription] is dropped.
//!
//! Snapshots are loaded and delivered while the registry is locked, so the
//! last snapshot a listener receives is always the latest state of the
//! workspace. A callback must not subscribe or unsubscribe, that would
//! deadlock.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::{Error, workspace::WorkspaceId};

/// Called with every snapshot delivered to a subscriber.
pub type SnapshotCallback<T> = Box<dyn FnMut(&[T]) + Send>;

/// Called when the store could not produce a snapshot.
pub type ErrorCallback = Box<dyn FnMut(&Error) + Send>;

type ListenerId = u64;

struct Listener<T> {
    id: ListenerId,
    workspace_id: WorkspaceId,
    on_snapshot: SnapshotCallback<T>,
    on_error: ErrorCallback,
}

struct Listeners<T> {
    next_id: ListenerId,
    entries: Vec<Listener<T>>,
}

/// The set of subscribers for a store, keyed by workspace.
pub struct ListenerRegistry<T> {
    inner: Arc<Mutex<Listeners<T>>>,
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<T: Send + 'static> ListenerRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `workspace_id`.
    ///
    /// `load_snapshot` is called with the registry locked and its result is
    /// delivered to `on_snapshot` (or `on_error`) before this function
    /// returns, so no publish can slip in between the initial snapshot and
    /// the registration.
    pub fn register(
        &self,
        workspace_id: WorkspaceId,
        load_snapshot: impl FnOnce() -> Result<Vec<T>, Error>,
        mut on_snapshot: SnapshotCallback<T>,
        mut on_error: ErrorCallback,
    ) -> Subscription {
        let mut listeners = lock(&self.inner);

        match load_snapshot() {
            Ok(snapshot) => on_snapshot(&snapshot),
            Err(error) => {
                tracing::warn!(
                    "Could not load initial snapshot for workspace {workspace_id}: {error}"
                );
                on_error(&error);
            }
        }

        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push(Listener {
            id,
            workspace_id,
            on_snapshot,
            on_error,
        });

        tracing::debug!("Registered listener {id} for workspace {workspace_id}");

        let registry: Weak<Mutex<Listeners<T>>> = Arc::downgrade(&self.inner);

        Subscription {
            remove: Some(Box::new(move || {
                // The store may already be gone, in which case there is nothing to remove.
                if let Some(registry) = registry.upgrade() {
                    lock(&registry).entries.retain(|listener| listener.id != id);
                    tracing::debug!("Removed listener {id}");
                }
            })),
        }
    }

    /// Load the current snapshot of `workspace_id` and deliver it to every
    /// listener of that workspace, or deliver the load error instead.
    ///
    /// The snapshot is loaded with the registry locked, so of two concurrent
    /// publishes the one delivered last also loaded last.
    pub fn publish(
        &self,
        workspace_id: WorkspaceId,
        load_snapshot: impl FnOnce() -> Result<Vec<T>, Error>,
    ) {
        let mut listeners = lock(&self.inner);
        let listeners = listeners
            .entries
            .iter_mut()
            .filter(|listener| listener.workspace_id == workspace_id);

        match load_snapshot() {
            Ok(snapshot) => {
                tracing::debug!(
                    "Publishing {} records to workspace {workspace_id}",
                    snapshot.len()
                );

                for listener in listeners {
                    (listener.on_snapshot)(&snapshot);
                }
            }
            Err(error) => {
                tracing::error!("Could not load snapshot for workspace {workspace_id}: {error}");

                for listener in listeners {
                    (listener.on_error)(&error);
                }
            }
        }
    }

    /// The number of live listeners for `workspace_id`.
    pub fn listener_count(&self, workspace_id: WorkspaceId) -> usize {
        lock(&self.inner)
            .entries
            .iter()
            .filter(|listener| listener.workspace_id == workspace_id)
            .count()
    }
}

// A listener that panicked poisons the lock, the remaining listeners are still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A handle to a live subscription.
///
/// The listener is removed when the handle is dropped or [Subscription::unsubscribe]
/// is called.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Stop receiving snapshots.
    pub fn unsubscribe(mut self) {
        self.remove_listener();
    }

    fn remove_listener(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove_listener();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::{Error, subscription::ListenerRegistry, workspace::WorkspaceId};

    type Received = Arc<Mutex<Vec<Vec<u32>>>>;

    fn recorder(received: &Received) -> Box<dyn FnMut(&[u32]) + Send> {
        let received = received.clone();
        Box::new(move |snapshot: &[u32]| received.lock().unwrap().push(snapshot.to_vec()))
    }

    #[test]
    fn delivers_initial_snapshot_on_register() {
        let registry = ListenerRegistry::new();
        let received = Received::default();

        let _subscription = registry.register(
            WorkspaceId::new(1),
            || Ok(vec![1, 2]),
            recorder(&received),
            Box::new(|_: &Error| {}),
        );

        assert_eq!(*received.lock().unwrap(), vec![vec![1, 2]]);
    }

    #[test]
    fn publishes_only_to_matching_workspace() {
        let registry = ListenerRegistry::new();
        let first = Received::default();
        let second = Received::default();
        let _first_subscription = registry.register(
            WorkspaceId::new(1),
            || Ok(vec![]),
            recorder(&first),
            Box::new(|_: &Error| {}),
        );
        let _second_subscription = registry.register(
            WorkspaceId::new(2),
            || Ok(vec![]),
            recorder(&second),
            Box::new(|_: &Error| {}),
        );

        registry.publish(WorkspaceId::new(1), || Ok(vec![7]));

        assert_eq!(*first.lock().unwrap(), vec![vec![], vec![7]]);
        assert_eq!(*second.lock().unwrap(), vec![Vec::<u32>::new()]);
    }

    #[test]
    fn stops_delivering_after_unsubscribe() {
        let registry = ListenerRegistry::new();
        let received = Received::default();
        let workspace_id = WorkspaceId::new(1);
        let subscription = registry.register(
            workspace_id,
            || Ok(vec![]),
            recorder(&received),
            Box::new(|_: &Error| {}),
        );
        assert_eq!(registry.listener_count(workspace_id), 1);

        subscription.unsubscribe();
        registry.publish(workspace_id, || Ok(vec![1]));

        assert_eq!(registry.listener_count(workspace_id), 0);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn dropping_the_handle_unsubscribes() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let workspace_id = WorkspaceId::new(1);

        {
            let _subscription = registry.register(
                workspace_id,
                || Ok(vec![]),
                Box::new(|_: &[u32]| {}),
                Box::new(|_: &Error| {}),
            );
            assert_eq!(registry.listener_count(workspace_id), 1);
        }

        assert_eq!(registry.listener_count(workspace_id), 0);
    }

    #[test]
    fn initial_load_failure_goes_to_error_callback() {
        let registry = ListenerRegistry::new();
        let received = Received::default();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();

        let _subscription = registry.register(
            WorkspaceId::new(1),
            || Err(Error::DatabaseLockError),
            recorder(&received),
            Box::new(move |error: &Error| errors_clone.lock().unwrap().push(error.to_string())),
        );

        assert!(received.lock().unwrap().is_empty());
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn publish_load_failure_goes_to_error_callback() {
        let registry = ListenerRegistry::new();
        let received = Received::default();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();
        let _subscription = registry.register(
            WorkspaceId::new(1),
            || Ok(vec![1]),
            recorder(&received),
            Box::new(move |error: &Error| errors_clone.lock().unwrap().push(error.to_string())),
        );

        registry.publish(WorkspaceId::new(1), || Err(Error::DatabaseLockError));

        assert_eq!(*received.lock().unwrap(), vec![vec![1]]);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }
}
