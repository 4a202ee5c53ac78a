//! The in-memory copy of a workspace's transactions.

use crate::transaction::Transaction;

/// The transactions of one workspace, ordered by date descending.
///
/// The cache is replaced wholesale with each snapshot from the store, there is
/// no incremental patching. Transactions without a date sort after all dated
/// ones and ties keep their snapshot order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionCache {
    transactions: Vec<Transaction>,
}

impl TransactionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding `snapshot`.
    pub fn from_snapshot(snapshot: &[Transaction]) -> Self {
        let mut cache = Self::new();
        cache.replace(snapshot);
        cache
    }

    /// Replace the contents of the cache with `snapshot` and re-sort.
    pub fn replace(&mut self, snapshot: &[Transaction]) {
        self.transactions = snapshot.to_vec();
        sort_by_date_descending(&mut self.transactions);
    }

    /// The cached transactions, newest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The number of cached transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the cache holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Stable sort, newest first. `None` compares below every date so undated
/// transactions end up last.
pub(crate) fn sort_by_date_descending(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date));
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    use crate::{
        dashboard::TransactionCache,
        transaction::{Transaction, TransactionType},
        workspace::WorkspaceId,
    };

    fn transaction(id: i64, date: Option<time::OffsetDateTime>) -> Transaction {
        Transaction {
            id,
            workspace_id: WorkspaceId::new(1),
            description: format!("#{id}"),
            amount: dec!(1),
            transaction_type: TransactionType::Expense,
            category: None,
            date,
            added_by: None,
            attachment: None,
        }
    }

    fn ids(cache: &TransactionCache) -> Vec<i64> {
        cache.transactions().iter().map(|t| t.id).collect()
    }

    #[test]
    fn sorts_newest_first_with_missing_dates_last() {
        let cache = TransactionCache::from_snapshot(&[
            transaction(1, None),
            transaction(2, Some(datetime!(2025-01-01 0:00 UTC))),
            transaction(3, Some(datetime!(2025-03-01 0:00 UTC))),
            transaction(4, None),
        ]);

        assert_eq!(ids(&cache), vec![3, 2, 1, 4]);
    }

    #[test]
    fn ties_keep_snapshot_order() {
        let same_day = Some(datetime!(2025-02-01 12:00 UTC));
        let cache = TransactionCache::from_snapshot(&[
            transaction(5, same_day),
            transaction(2, same_day),
            transaction(9, same_day),
        ]);

        assert_eq!(ids(&cache), vec![5, 2, 9]);
    }

    #[test]
    fn replace_discards_previous_contents() {
        let mut cache = TransactionCache::from_snapshot(&[transaction(1, None)]);

        cache.replace(&[transaction(2, None), transaction(3, None)]);

        assert_eq!(ids(&cache), vec![2, 3]);
        assert_eq!(cache.len(), 2);

        cache.replace(&[]);

        assert!(cache.is_empty());
    }
}
