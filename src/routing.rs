//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};

use crate::{
    AppState, Error,
    auth::{admin_guard, auth_guard},
    category::{get_categories_endpoint, set_categories_endpoint},
    chat::{get_messages_endpoint, post_message_endpoint},
    customer::get_customer_view,
    endpoints,
    session::{close_session_endpoint, get_session_endpoint, set_filter_endpoint},
    transaction::{
        MAX_INLINE_ATTACHMENT_BYTES, create_transaction_endpoint, delete_transaction_endpoint,
    },
    user::{
        assign_workspace_endpoint, ban_user_endpoint, delete_user_endpoint, list_users_endpoint,
        register_user_endpoint, toggle_admin_endpoint, unban_user_endpoint,
    },
    workspace::{create_workspace_endpoint, delete_workspace_endpoint, list_workspaces_endpoint},
};

/// The largest request body accepted, in bytes.
///
/// Leaves room for a maximum size inline attachment and the rest of the form.
pub const REQUEST_BODY_LIMIT: usize = 2 * MAX_INLINE_ATTACHMENT_BYTES;

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::COFFEE, get(get_coffee))
        .route(endpoints::USERS, post(register_user_endpoint))
        .route(endpoints::CUSTOMER_VIEW, get(get_customer_view));

    let admin_routes = Router::new()
        .route(
            endpoints::ADMIN_WORKSPACES,
            get(list_workspaces_endpoint).post(create_workspace_endpoint),
        )
        .route(
            endpoints::ADMIN_WORKSPACE,
            delete(delete_workspace_endpoint),
        )
        .route(endpoints::ADMIN_USERS, get(list_users_endpoint))
        .route(endpoints::ADMIN_USER, delete(delete_user_endpoint))
        .route(
            endpoints::ADMIN_USER_WORKSPACE,
            put(assign_workspace_endpoint),
        )
        .route(endpoints::ADMIN_USER_BAN, post(ban_user_endpoint))
        .route(endpoints::ADMIN_USER_UNBAN, post(unban_user_endpoint))
        .route(
            endpoints::ADMIN_USER_TOGGLE_ADMIN,
            post(toggle_admin_endpoint),
        )
        .route_layer(middleware::from_fn(admin_guard));

    // Admin routes are merged before the auth layer so that `admin_guard` sees the user.
    let protected_routes = Router::new()
        .route(
            endpoints::SESSION,
            get(get_session_endpoint).delete(close_session_endpoint),
        )
        .route(endpoints::SESSION_FILTER, put(set_filter_endpoint))
        .route(endpoints::TRANSACTIONS, post(create_transaction_endpoint))
        .route(endpoints::TRANSACTION, delete(delete_transaction_endpoint))
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).put(set_categories_endpoint),
        )
        .route(
            endpoints::CHAT,
            get(get_messages_endpoint).post(post_message_endpoint),
        )
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
        .with_state(state)
}

/// Attempt to get a cup of coffee from the server.
async fn get_coffee() -> Response {
    (StatusCode::IM_A_TEAPOT, "I'm a teapot").into_response()
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
