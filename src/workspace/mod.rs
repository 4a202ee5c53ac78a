//! Workspaces (companies), the tenant boundary of the application.
//!
//! Every transaction, category list and chat message belongs to exactly one
//! workspace. Administrators create and delete workspaces and assign users to
//! them.

mod core;
mod endpoints;

pub use core::{
    Workspace, WorkspaceId, create_workspace, create_workspace_table, delete_workspace,
    get_workspace, get_workspace_by_share_token, list_workspaces,
};
pub use endpoints::{
    create_workspace_endpoint, delete_workspace_endpoint, list_workspaces_endpoint,
};
