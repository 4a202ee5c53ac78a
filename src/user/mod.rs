//! Users, registration and the admin user panel.

mod core;
mod endpoints;

pub use core::{
    User, UserId, count_users, create_user_table, delete_user, get_user_by_id, list_users,
    register_user, set_user_banned, set_user_workspace, toggle_user_admin,
};
pub use endpoints::{
    assign_workspace_endpoint, ban_user_endpoint, delete_user_endpoint, list_users_endpoint,
    register_user_endpoint, toggle_admin_endpoint, unban_user_endpoint,
};
