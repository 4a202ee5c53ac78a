//! Keeps one open session per signed-in user.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    Error,
    session::{Clock, ReportSlot, WorkspaceSession},
    transaction::TransactionStore,
    user::{User, UserId},
    workspace::WorkspaceId,
};

/// A session together with the slot it presents into.
#[derive(Debug)]
pub struct OpenSession {
    /// The session.
    pub session: WorkspaceSession,
    /// Where the session's reports end up.
    pub slot: ReportSlot,
}

/// The open sessions of the server, one per user.
#[derive(Debug, Clone, Default)]
pub struct Sessions {
    open: Arc<Mutex<HashMap<UserId, Arc<OpenSession>>>>,
}

impl Sessions {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session of `user`, opening one if needed.
    ///
    /// A session opened for a different workspace than the user's current one
    /// is closed and replaced.
    ///
    /// # Errors
    /// Returns [Error::NoWorkspace] if the user has not been assigned to a workspace.
    pub fn open_or_get(
        &self,
        store: &dyn TransactionStore,
        user: &User,
        clock: Clock,
    ) -> Result<Arc<OpenSession>, Error> {
        let workspace_id = user.require_workspace()?;
        let mut open = self.lock()?;

        if let Some(existing) = open.get(&user.id)
            && existing.session.workspace_id() == workspace_id
        {
            return Ok(existing.clone());
        }

        let slot = ReportSlot::new();
        let session = WorkspaceSession::open(store, user.clone(), Box::new(slot.clone()), clock)?;
        let opened = Arc::new(OpenSession { session, slot });

        if let Some(replaced) = open.insert(user.id, opened.clone()) {
            tracing::info!(
                "Replaced session of user {} for workspace {}",
                user.id,
                replaced.session.workspace_id()
            );
        }

        Ok(opened)
    }

    /// Get the session of `user_id` if one is open.
    pub fn get(&self, user_id: UserId) -> Result<Option<Arc<OpenSession>>, Error> {
        Ok(self.lock()?.get(&user_id).cloned())
    }

    /// Close the session of `user_id` on log out.
    ///
    /// Returns whether a session was open.
    pub fn close(&self, user_id: UserId) -> Result<bool, Error> {
        let removed = self.lock()?.remove(&user_id);

        if removed.is_some() {
            tracing::info!("User {user_id} logged out");
        }

        Ok(removed.is_some())
    }

    /// Close the session of `user_id` after an administrator changed the
    /// user's account, e.g. reassigned, banned or deleted it.
    pub fn close_user(&self, user_id: UserId) -> Result<(), Error> {
        if self.lock()?.remove(&user_id).is_some() {
            tracing::info!("Closed session of user {user_id} after an account change");
        }

        Ok(())
    }

    /// Close every session in `workspace_id`, e.g. after it was deleted.
    ///
    /// Returns the number of sessions closed.
    pub fn close_workspace(&self, workspace_id: WorkspaceId) -> Result<usize, Error> {
        let mut open = self.lock()?;
        let before = open.len();
        open.retain(|_, open_session| open_session.session.workspace_id() != workspace_id);
        let closed = before - open.len();

        tracing::info!("Closed {closed} sessions in workspace {workspace_id}");

        Ok(closed)
    }

    /// The number of open sessions.
    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<UserId, Arc<OpenSession>>>, Error> {
        self.open.lock().map_err(|error| {
            tracing::error!("could not acquire sessions lock: {error}");
            Error::SessionLockError
        })
    }
}
