//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/users/{user_id}', use [format_endpoint].

/// The route to request a cup of coffee (experimental).
pub const COFFEE: &str = "/api/coffee";
/// The route for registering users.
pub const USERS: &str = "/api/users";
/// The route for the read-only view of a workspace shared with customers.
pub const CUSTOMER_VIEW: &str = "/api/customer/{share_token}";

/// The route to read or close the current user's workspace session.
pub const SESSION: &str = "/api/session";
/// The route to change the filter of the current user's session.
pub const SESSION_FILTER: &str = "/api/session/filter";
/// The route to create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to read and replace the workspace's categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to read and post workspace chat messages.
pub const CHAT: &str = "/api/chat";

/// The route to list and create workspaces.
pub const ADMIN_WORKSPACES: &str = "/api/admin/workspaces";
/// The route to delete a workspace.
pub const ADMIN_WORKSPACE: &str = "/api/admin/workspaces/{workspace_id}";
/// The route to list users.
pub const ADMIN_USERS: &str = "/api/admin/users";
/// The route to delete a user.
pub const ADMIN_USER: &str = "/api/admin/users/{user_id}";
/// The route to assign a user to a workspace.
pub const ADMIN_USER_WORKSPACE: &str = "/api/admin/users/{user_id}/workspace";
/// The route to ban a user.
pub const ADMIN_USER_BAN: &str = "/api/admin/users/{user_id}/ban";
/// The route to lift a user's ban.
pub const ADMIN_USER_UNBAN: &str = "/api/admin/users/{user_id}/unban";
/// The route to grant or revoke a user's admin rights.
pub const ADMIN_USER_TOGGLE_ADMIN: &str = "/api/admin/users/{user_id}/toggle-admin";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
