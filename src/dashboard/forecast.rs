//! Balance forecasting and transaction frequency statistics.

use std::fmt::Display;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, ser::SerializeStruct};
use time::{Duration, OffsetDateTime};

use crate::{
    dashboard::aggregation::saturating_sum,
    transaction::{Transaction, TransactionType},
};

/// How far back the daily rates look.
pub const FORECAST_WINDOW_DAYS: i64 = 90;
/// How far ahead the balance is projected.
pub const PROJECTION_DAYS: i64 = 30;
/// The elapsed days assumed when the window holds no transactions.
const EMPTY_WINDOW_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whether the balance is expected to grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Income is outpacing expenses.
    Positive,
    /// Expenses are keeping pace with or outpacing income.
    AtRisk,
}

/// A linear projection of the balance 30 days ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Forecast {
    /// The signed sum of every transaction.
    pub current_balance: Decimal,
    /// Income per day over the window.
    pub daily_income_rate: Decimal,
    /// Expenses per day over the window.
    pub daily_expense_rate: Decimal,
    /// `daily_income_rate - daily_expense_rate`.
    pub daily_net: Decimal,
    /// The expected change in balance over the next 30 days.
    pub projected_delta_30: Decimal,
    /// `current_balance + projected_delta_30`.
    pub forecast_balance: Decimal,
    /// [Trend::Positive] if `daily_net` is above zero.
    pub trend: Trend,
    /// The absolute value of `projected_delta_30`.
    pub magnitude: Decimal,
}

impl Forecast {
    /// Project the balance of `transactions` from the daily net rate of the
    /// last 90 days before `now`.
    pub fn from_transactions(transactions: &[Transaction], now: OffsetDateTime) -> Self {
        let cutoff = now - Duration::days(FORECAST_WINDOW_DAYS);

        let mut window_income = Decimal::ZERO;
        let mut window_expense = Decimal::ZERO;
        let mut earliest: Option<OffsetDateTime> = None;

        for transaction in transactions {
            let Some(date) = transaction.date.filter(|&date| date > cutoff) else {
                continue;
            };

            match transaction.transaction_type {
                TransactionType::Income => {
                    window_income = window_income.saturating_add(transaction.amount)
                }
                TransactionType::Expense => {
                    window_expense = window_expense.saturating_add(transaction.amount)
                }
            }

            earliest = Some(earliest.map_or(date, |earliest| earliest.min(date)));
        }

        let elapsed_days = match earliest {
            Some(earliest) => fractional_days(now - earliest).max(Decimal::ONE),
            None => Decimal::from(EMPTY_WINDOW_DAYS),
        };

        let daily_income_rate = window_income / elapsed_days;
        let daily_expense_rate = window_expense / elapsed_days;
        let daily_net = daily_income_rate.saturating_sub(daily_expense_rate);
        let projected_delta_30 = daily_net.saturating_mul(Decimal::from(PROJECTION_DAYS));

        let current_balance = saturating_sum(
            transactions
                .iter()
                .map(|transaction| transaction.signed_amount()),
        );

        Self {
            current_balance,
            daily_income_rate,
            daily_expense_rate,
            daily_net,
            projected_delta_30,
            forecast_balance: current_balance.saturating_add(projected_delta_30),
            trend: if daily_net > Decimal::ZERO {
                Trend::Positive
            } else {
                Trend::AtRisk
            },
            magnitude: projected_delta_30.abs(),
        }
    }
}

fn fractional_days(duration: Duration) -> Decimal {
    Decimal::from(duration.whole_seconds()) / Decimal::from(SECONDS_PER_DAY)
}

/// How often transactions of one type happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Fewer than two dated transactions.
    InsufficientData,
    /// The average number of days between transactions, to one decimal place.
    Every(Decimal),
}

impl Frequency {
    /// The average interval between the dated transactions of `transaction_type`.
    pub fn of(transactions: &[Transaction], transaction_type: TransactionType) -> Self {
        let mut dates: Vec<OffsetDateTime> = transactions
            .iter()
            .filter(|transaction| transaction.transaction_type == transaction_type)
            .filter_map(|transaction| transaction.date)
            .collect();

        if dates.len() < 2 {
            return Frequency::InsufficientData;
        }

        dates.sort();

        let (first, last) = (dates[0], dates[dates.len() - 1]);
        let intervals = Decimal::from(dates.len() - 1);
        let average = fractional_days(last - first) / intervals;

        Frequency::Every(average.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
    }

    /// The average interval in days, if there is enough data.
    pub fn avg_interval_days(&self) -> Option<Decimal> {
        match self {
            Frequency::InsufficientData => None,
            Frequency::Every(days) => Some(*days),
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::InsufficientData => write!(f, "Veri yetersiz"),
            Frequency::Every(days) => write!(f, "Ort. {days:.1} günde bir"),
        }
    }
}

impl Serialize for Frequency {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Frequency", 2)?;
        state.serialize_field("avg_interval_days", &self.avg_interval_days())?;
        state.serialize_field("label", &self.to_string())?;
        state.end()
    }
}

/// Income and expense frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrequencyStats {
    /// How often income arrives.
    pub income: Frequency,
    /// How often money is spent.
    pub expense: Frequency,
}

impl FrequencyStats {
    /// Compute both frequencies over `transactions`.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        Self {
            income: Frequency::of(transactions, TransactionType::Income),
            expense: Frequency::of(transactions, TransactionType::Expense),
        }
    }
}


#[cfg(test)]
mod frequency_tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::{OffsetDateTime, macros::datetime};

    use crate::{
        dashboard::{Frequency, FrequencyStats},
        transaction::{Transaction, TransactionType},
        workspace::WorkspaceId,
    };

    fn transaction(transaction_type: TransactionType, date: Option<OffsetDateTime>) -> Transaction {
        Transaction {
            id: 0,
            workspace_id: WorkspaceId::new(1),
            description: "test".to_owned(),
            amount: dec!(1),
            transaction_type,
            category: None,
            date,
            added_by: None,
            attachment: None,
        }
    }

    #[test]
    fn empty_set_has_insufficient_data() {
        let stats = FrequencyStats::from_transactions(&[]);

        assert_eq!(stats.income, Frequency::InsufficientData);
        assert_eq!(stats.expense.to_string(), "Veri yetersiz");
    }

    #[test]
    fn ten_and_four_day_intervals() {
        let transactions = vec![
            transaction(TransactionType::Income, Some(datetime!(2025-01-11 0:00 UTC))),
            transaction(TransactionType::Income, Some(datetime!(2025-01-01 0:00 UTC))),
            transaction(TransactionType::Expense, Some(datetime!(2025-02-01 0:00 UTC))),
            transaction(TransactionType::Expense, Some(datetime!(2025-02-05 0:00 UTC))),
        ];

        let stats = FrequencyStats::from_transactions(&transactions);

        assert_eq!(stats.income.to_string(), "Ort. 10.0 günde bir");
        assert_eq!(stats.expense.to_string(), "Ort. 4.0 günde bir");
    }

    #[test]
    fn undated_transactions_are_ignored() {
        let transactions = vec![
            transaction(TransactionType::Income, Some(datetime!(2025-01-01 0:00 UTC))),
            transaction(TransactionType::Income, None),
        ];

        assert_eq!(
            Frequency::of(&transactions, TransactionType::Income),
            Frequency::InsufficientData
        );
    }

    #[test]
    fn average_is_rounded_half_away_from_zero() {
        // 3 intervals over 10 days and 6 hours, 3.41666.. days each.
        let transactions = vec![
            transaction(TransactionType::Expense, Some(datetime!(2025-01-01 0:00 UTC))),
            transaction(TransactionType::Expense, Some(datetime!(2025-01-05 0:00 UTC))),
            transaction(TransactionType::Expense, Some(datetime!(2025-01-11 6:00 UTC))),
            transaction(TransactionType::Expense, Some(datetime!(2025-01-08 0:00 UTC))),
        ];

        let frequency = Frequency::of(&transactions, TransactionType::Expense);

        assert_eq!(frequency.avg_interval_days(), Some(dec!(3.4)));
        assert_eq!(frequency.to_string(), "Ort. 3.4 günde bir");
    }

    #[test]
    fn serializes_value_and_label() {
        let json = serde_json::to_value(Frequency::Every(Decimal::from(2))).unwrap();

        assert_eq!(json["label"], "Ort. 2.0 günde bir");
        assert_eq!(
            serde_json::to_value(Frequency::InsufficientData).unwrap()["avg_interval_days"],
            serde_json::Value::Null
        );
    }
}
