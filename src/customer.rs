//! The read-only view of a workspace shared with its customers.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    dashboard::{Report, TransactionCache, TransactionFilter},
    session::Clock,
    transaction::{SQLiteTransactionStore, TransactionStore},
    workspace::get_workspace_by_share_token,
};

/// The state needed for the customer view.
#[derive(Clone)]
pub struct CustomerViewState {
    /// The database connection for looking up the workspace.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The store to read the workspace's transactions from.
    pub store: SQLiteTransactionStore,
    /// The time the forecast is computed against.
    pub clock: Clock,
}

impl FromRef<AppState> for CustomerViewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            store: state.transaction_store.clone(),
            clock: state.clock.clone(),
        }
    }
}

/// What a customer sees.
#[derive(Debug, Serialize)]
pub struct CustomerView {
    /// The workspace's display name.
    pub workspace_name: String,
    /// The workspace's report for the requested filter.
    pub report: Report,
}

/// A route handler that renders a workspace's report for anyone with the link.
///
/// The link carries the workspace's share token, not its ID.
/// Responds with 404 if no workspace has the token.
pub async fn get_customer_view(
    State(state): State<CustomerViewState>,
    Path(share_token): Path<String>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<CustomerView>, Error> {
    let workspace = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_workspace_by_share_token(&share_token, &connection)?
    };

    let cache = TransactionCache::from_snapshot(&state.store.snapshot(workspace.id)?);
    let report = Report::build(&cache, &filter, (state.clock)());

    Ok(Json(CustomerView {
        workspace_name: workspace.name,
        report,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum_test::TestServer;
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    use crate::{
        AppState, build_router,
        transaction::{Transaction, TransactionStore, TransactionType},
        workspace::create_workspace,
    };

    fn get_test_server() -> (TestServer, AppState) {
        let now = datetime!(2025-06-01 12:00 UTC);
        let state = AppState::new(Connection::open_in_memory().unwrap())
            .unwrap()
            .with_clock(Arc::new(move || now));

        (
            TestServer::try_new(build_router(state.clone())).expect("Could not create test server."),
            state,
        )
    }

    #[tokio::test]
    async fn renders_filtered_report_without_auth() {
        let (server, state) = get_test_server();
        let workspace = {
            let connection = state.db_connection.lock().unwrap();
            create_workspace("Acme", "ACME", datetime!(2025-01-01 0:00 UTC), &connection).unwrap()
        };
        for (amount, description, transaction_type) in [
            (dec!(100), "Maaş", TransactionType::Income),
            (dec!(25), "Market", TransactionType::Expense),
        ] {
            state
                .transaction_store
                .create(
                    Transaction::build(workspace.id, amount, description)
                        .transaction_type(transaction_type),
                )
                .unwrap();
        }

        let response = server
            .get(&format!("/api/customer/{}", workspace.share_token))
            .add_query_param("search", "market")
            .add_query_param("type", "expense")
            .await;

        response.assert_status_ok();
        let json = response.json::<serde_json::Value>();
        assert_eq!(json["workspace_name"], "Acme");
        assert_eq!(json["report"]["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(json["report"]["totals"]["net"], "75");
    }

    #[tokio::test]
    async fn unknown_workspace_is_not_found() {
        let (server, _) = get_test_server();

        let response = server.get("/api/customer/42").await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn workspace_id_does_not_open_customer_view() {
        let (server, state) = get_test_server();
        let workspace = {
            let connection = state.db_connection.lock().unwrap();
            create_workspace("Acme", "ACME", datetime!(2025-01-01 0:00 UTC), &connection).unwrap()
        };

        server
            .get(&format!("/api/customer/{}", workspace.id))
            .await
            .assert_status_not_found();
        server
            .get(&format!("/api/customer/{}", workspace.share_token))
            .await
            .assert_status_ok();
    }
}
