//! Text and type filtering for the transaction list.

use serde::{Deserialize, Serialize};

use crate::transaction::{Transaction, TransactionType};

/// Which transaction types to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    /// Income and expenses.
    #[default]
    All,
    /// Income only.
    Income,
    /// Expenses only.
    Expense,
}

impl TypeFilter {
    /// Whether `transaction_type` passes this filter.
    pub fn matches(&self, transaction_type: TransactionType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Income => transaction_type == TransactionType::Income,
            TypeFilter::Expense => transaction_type == TransactionType::Expense,
        }
    }
}

/// A search term and type selector applied to the transaction list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Matched case-insensitively against the description, author and
    /// category. An empty term matches everything.
    #[serde(default)]
    pub search: String,
    /// Which transaction types to keep.
    #[serde(default, rename = "type")]
    pub type_filter: TypeFilter,
}

impl TransactionFilter {
    /// Create a filter from a search term and type selector.
    pub fn new(search: &str, type_filter: TypeFilter) -> Self {
        Self {
            search: search.to_owned(),
            type_filter,
        }
    }

    /// Whether `transaction` passes the filter.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.type_filter.matches(transaction.transaction_type)
            && matches_term(transaction, &self.search.to_lowercase())
    }

    /// The transactions that pass the filter, in their original order.
    pub fn apply(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        let term = self.search.to_lowercase();

        transactions
            .iter()
            .filter(|transaction| {
                self.type_filter.matches(transaction.transaction_type)
                    && matches_term(transaction, &term)
            })
            .cloned()
            .collect()
    }
}

// `term` must already be lower case.
fn matches_term(transaction: &Transaction, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }

    let contains = |field: &str| field.to_lowercase().contains(term);

    contains(&transaction.description)
        || transaction.added_by.as_deref().is_some_and(contains)
        || transaction.category.as_deref().is_some_and(contains)
}
