//! Per-user application state.
//!
//! A [WorkspaceSession] is created when a user enters their workspace and
//! closed when they log out or are moved to another workspace. The server
//! keeps one per user in [Sessions] and presents each session's reports into
//! a [ReportSlot] that the HTTP API reads from.

mod endpoints;
mod presenter;
mod registry;
mod workspace_session;

pub use endpoints::{
    SessionsState, close_session_endpoint, get_session_endpoint, set_filter_endpoint,
};
pub use presenter::{Presenter, ReportSlot, SlotContents};
pub use registry::Sessions;
pub use workspace_session::{Clock, WorkspaceSession, system_clock};
