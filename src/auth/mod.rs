//! Request identity.
//!
//! Users are authenticated upstream, the server trusts the `X-User-Id` header
//! and resolves it to a [User](crate::User) for the route handlers.

mod middleware;

pub use middleware::{AuthState, USER_ID_HEADER, admin_guard, auth_guard};
