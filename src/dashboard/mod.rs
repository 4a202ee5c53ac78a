//! The reporting pipeline.
//!
//! A [TransactionCache] holds a workspace's transactions, a
//! [TransactionFilter] selects which of them to list, and the aggregator and
//! forecaster summarise the whole set into a [Report].

mod aggregation;
mod cache;
mod filter;
mod forecast;
mod report;

pub use aggregation::{Bucket, CategoryBreakdown, Share, Totals};
pub use cache::TransactionCache;
pub use filter::{TransactionFilter, TypeFilter};
pub use forecast::{Forecast, Frequency, FrequencyStats, Trend};
pub use report::Report;
