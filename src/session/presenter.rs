//! Where rendered reports go.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::dashboard::Report;

/// Receives the output of a [WorkspaceSession](crate::WorkspaceSession).
///
/// Presenters are called with the session's state locked and must not call
/// back into the session.
pub trait Presenter: Send {
    /// Show a freshly computed report.
    fn present(&mut self, report: &Report);

    /// Show a persistent error, e.g. the live updates stopped working.
    ///
    /// The last presented report stays valid.
    fn present_error(&mut self, message: &str);

    /// Remove the error shown by [Presenter::present_error].
    fn clear_error(&mut self) {}
}

/// The contents of a [ReportSlot] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotContents {
    /// Incremented on every report or error presented.
    pub revision: u64,
    /// The latest report, `None` until the first snapshot arrives.
    pub report: Option<Report>,
    /// The current sync error, if any.
    pub error: Option<String>,
}

/// A presenter that keeps the latest report for the HTTP API to serve.
///
/// Clones share the same slot. Clients can poll `revision` to find out
/// whether anything changed.
#[derive(Debug, Clone, Default)]
pub struct ReportSlot {
    contents: Arc<Mutex<SlotContents>>,
}

impl ReportSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current contents.
    pub fn read(&self) -> SlotContents {
        self.update(|_| {})
    }

    fn update(&self, change: impl FnOnce(&mut SlotContents)) -> SlotContents {
        // The contents are always left consistent, so a poisoned lock is still usable.
        let mut contents = self
            .contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        change(&mut contents);
        contents.clone()
    }
}

impl Presenter for ReportSlot {
    fn present(&mut self, report: &Report) {
        self.update(|contents| {
            contents.revision += 1;
            contents.report = Some(report.clone());
        });
    }

    fn present_error(&mut self, message: &str) {
        self.update(|contents| {
            contents.revision += 1;
            contents.error = Some(message.to_owned());
        });
    }

    fn clear_error(&mut self) {
        self.update(|contents| {
            if contents.error.take().is_some() {
                contents.revision += 1;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{
        dashboard::{Report, TransactionCache, TransactionFilter},
        session::{Presenter, ReportSlot},
    };

    fn empty_report() -> Report {
        Report::build(
            &TransactionCache::new(),
            &TransactionFilter::default(),
            datetime!(2025-01-01 0:00 UTC),
        )
    }

    #[test]
    fn present_bumps_revision_and_is_shared_by_clones() {
        let slot = ReportSlot::new();
        let mut presenter = slot.clone();

        presenter.present(&empty_report());

        let contents = slot.read();
        assert_eq!(contents.revision, 1);
        assert_eq!(contents.report, Some(empty_report()));
    }

    #[test]
    fn error_persists_until_cleared() {
        let mut slot = ReportSlot::new();
        slot.present(&empty_report());

        slot.present_error("connection lost");
        slot.present(&empty_report());

        assert_eq!(slot.read().error.as_deref(), Some("connection lost"));

        slot.clear_error();

        assert_eq!(slot.read().error, None);
        assert_eq!(slot.read().revision, 4);
    }
}
