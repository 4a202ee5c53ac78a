//! Totals and category breakdowns over a set of transactions.
//!
//! All sums are exact decimal sums that saturate at [Decimal::MAX] instead of
//! overflowing. The results are always computed over the full workspace set,
//! not the filtered list.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::transaction::{Transaction, TransactionType};

/// The bucket for expenses without a category.
pub const FALLBACK_CATEGORY: &str = "Diğer";
/// The income bucket of the income-vs-expense breakdown.
pub const INCOME_LABEL: &str = "Gelir";
/// The expense bucket of the income-vs-expense breakdown.
pub const EXPENSE_LABEL: &str = "Gider";

/// Income, expense and net totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// The sum of all income amounts.
    pub total_income: Decimal,
    /// The sum of all expense amounts.
    pub total_expense: Decimal,
    /// `total_income - total_expense`.
    pub net: Decimal,
}

impl Totals {
    /// Sum `transactions` by type.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut total_income = Decimal::ZERO;
        let mut total_expense = Decimal::ZERO;

        for transaction in transactions {
            match transaction.transaction_type {
                TransactionType::Income => {
                    total_income = total_income.saturating_add(transaction.amount)
                }
                TransactionType::Expense => {
                    total_expense = total_expense.saturating_add(transaction.amount)
                }
            }
        }

        Self {
            total_income,
            total_expense,
            net: total_income.saturating_sub(total_expense),
        }
    }
}

/// A labelled amount in a [CategoryBreakdown].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// The category name, or one of the fallback labels.
    pub label: String,
    /// The summed magnitude.
    pub amount: Decimal,
}

/// A bucket's share of the breakdown total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Share {
    /// The bucket label.
    pub label: String,
    /// The percentage of the total, rounded to one decimal place.
    pub percent: Decimal,
}

/// Where the money went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryBreakdown {
    /// Expense sums per category, alphabetical with the fallback bucket last.
    ByCategory {
        /// One bucket per category with at least one expense.
        buckets: Vec<Bucket>,
    },
    /// Used when there are no expenses to break down.
    IncomeVsExpense {
        /// Total income.
        income: Decimal,
        /// Total expenses, zero when this variant is chosen.
        expense: Decimal,
    },
}

impl CategoryBreakdown {
    /// Sum the expenses in `transactions` per category.
    ///
    /// Expenses without a category are counted under [FALLBACK_CATEGORY]. If
    /// there are no expenses the breakdown falls back to income vs expense.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut totals: HashMap<&str, Decimal> = HashMap::new();

        for transaction in transactions.iter().filter(|t| t.is_expense()) {
            let label = transaction.category.as_deref().unwrap_or(FALLBACK_CATEGORY);
            let total = totals.entry(label).or_insert(Decimal::ZERO);
            *total = total.saturating_add(transaction.amount);
        }

        if totals.values().all(|amount| amount.is_zero()) {
            let totals = Totals::from_transactions(transactions);

            return CategoryBreakdown::IncomeVsExpense {
                income: totals.total_income,
                expense: totals.total_expense,
            };
        }

        let mut labels: Vec<&str> = totals
            .keys()
            .copied()
            .filter(|&label| label != FALLBACK_CATEGORY)
            .collect();
        labels.sort();

        if totals.contains_key(FALLBACK_CATEGORY) {
            labels.push(FALLBACK_CATEGORY);
        }

        CategoryBreakdown::ByCategory {
            buckets: labels
                .into_iter()
                .map(|label| Bucket {
                    label: label.to_owned(),
                    amount: totals[label],
                })
                .collect(),
        }
    }

    /// The buckets in display order.
    ///
    /// The income-vs-expense form yields two buckets labelled
    /// [INCOME_LABEL] and [EXPENSE_LABEL].
    pub fn buckets(&self) -> Vec<Bucket> {
        match self {
            CategoryBreakdown::ByCategory { buckets } => buckets.clone(),
            CategoryBreakdown::IncomeVsExpense { income, expense } => vec![
                Bucket {
                    label: INCOME_LABEL.to_owned(),
                    amount: *income,
                },
                Bucket {
                    label: EXPENSE_LABEL.to_owned(),
                    amount: *expense,
                },
            ],
        }
    }

    /// The sum of every bucket.
    pub fn total(&self) -> Decimal {
        saturating_sum(self.buckets().iter().map(|bucket| bucket.amount))
    }

    /// Each bucket's percentage of [CategoryBreakdown::total].
    ///
    /// Every share is zero when the total is zero.
    pub fn shares(&self) -> Vec<Share> {
        let buckets = self.buckets();
        let total = saturating_sum(buckets.iter().map(|bucket| bucket.amount));

        buckets
            .into_iter()
            .map(|bucket| {
                let percent = if total.is_zero() {
                    Decimal::ZERO
                } else {
                    // Divide first, a bucket is never larger than the total.
                    (bucket.amount / total)
                        .saturating_mul(Decimal::ONE_HUNDRED)
                        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
                };

                Share {
                    label: bucket.label,
                    percent,
                }
            })
            .collect()
    }
}

/// Sum `amounts`, clamping to [Decimal::MAX] or [Decimal::MIN] on overflow.
pub(crate) fn saturating_sum(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |sum, amount| sum.saturating_add(amount))
}
