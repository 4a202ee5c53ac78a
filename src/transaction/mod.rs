//! Transaction management for the bookkeeping application.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `NewTransaction` builder
//! - Database functions for storing, querying, and deleting transactions
//! - The `TransactionStore` that pushes snapshots to subscribers
//! - Route handlers for creating and deleting transactions

mod core;
mod create_endpoint;
mod delete_endpoint;
mod store;

pub use core::{
    AttachmentRef, MAX_INLINE_ATTACHMENT_BYTES, NewTransaction, Transaction, TransactionType,
    ValidatedTransaction, create_transaction_table,
};
pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::delete_transaction_endpoint;
pub use store::{SQLiteTransactionStore, TransactionStore};
