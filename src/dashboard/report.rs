//! The bundle of values handed to a presenter.

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    dashboard::{
        CategoryBreakdown, Forecast, FrequencyStats, Totals, TransactionCache, TransactionFilter,
        aggregation::Share,
    },
    transaction::Transaction,
};

/// Everything needed to render a workspace's dashboard.
///
/// Only `transactions` is filtered. The totals, breakdown, forecast and
/// frequencies always describe the whole workspace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// The filter that produced `transactions`.
    pub filter: TransactionFilter,
    /// The filtered transactions, newest first.
    pub transactions: Vec<Transaction>,
    /// Income, expense and net over the whole workspace.
    pub totals: Totals,
    /// Expenses per category over the whole workspace.
    pub category_breakdown: CategoryBreakdown,
    /// The percentage share of each breakdown bucket.
    pub shares: Vec<Share>,
    /// The 30 day balance projection.
    pub forecast: Forecast,
    /// How often income and expenses occur.
    pub frequency: FrequencyStats,
    /// The time the forecast was computed against.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

impl Report {
    /// Run the filter, aggregator and forecaster over `cache`.
    pub fn build(
        cache: &TransactionCache,
        filter: &TransactionFilter,
        now: OffsetDateTime,
    ) -> Self {
        let all = cache.transactions();
        let category_breakdown = CategoryBreakdown::from_transactions(all);

        Self {
            filter: filter.clone(),
            transactions: filter.apply(all),
            totals: Totals::from_transactions(all),
            shares: category_breakdown.shares(),
            category_breakdown,
            forecast: Forecast::from_transactions(all, now),
            frequency: FrequencyStats::from_transactions(all),
            generated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    use crate::{
        dashboard::{Report, TransactionCache, TransactionFilter, TypeFilter},
        transaction::{Transaction, TransactionType},
        workspace::WorkspaceId,
    };

    fn transaction(id: i64, transaction_type: TransactionType) -> Transaction {
        Transaction {
            id,
            workspace_id: WorkspaceId::new(1),
            description: format!("#{id}"),
            amount: dec!(10),
            transaction_type,
            category: None,
            date: None,
            added_by: None,
            attachment: None,
        }
    }

    #[test]
    fn totals_ignore_the_filter() {
        let cache = TransactionCache::from_snapshot(&[
            transaction(1, TransactionType::Income),
            transaction(2, TransactionType::Expense),
        ]);
        let filter = TransactionFilter::new("", TypeFilter::Income);

        let report = Report::build(&cache, &filter, datetime!(2025-01-01 0:00 UTC));

        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.totals.total_income, dec!(10));
        assert_eq!(report.totals.total_expense, dec!(10));
        assert_eq!(report.forecast.current_balance, dec!(0));
    }

    #[test]
    fn serializes_to_json() {
        let cache = TransactionCache::from_snapshot(&[transaction(1, TransactionType::Expense)]);

        let json = serde_json::to_value(Report::build(
            &cache,
            &TransactionFilter::default(),
            datetime!(2025-01-01 0:00 UTC),
        ))
        .unwrap();

        assert_eq!(json["category_breakdown"]["kind"], "by_category");
        assert_eq!(json["transactions"][0]["type"], "expense");
        assert_eq!(json["frequency"]["income"]["label"], "Veri yetersiz");
        assert_eq!(json["generated_at"], "2025-01-01T00:00:00Z");
    }
}
