//! Usage ledger and the views derived from it
//!
//! The append-only [`UsageRecord`] ledger is the single source of truth for
//! consumption and cost. Everything else in this module — aggregates,
//! forecasts, alerts, recommendations — is a recomputable projection that
//! may be cached but is never authoritative.
//!
//! # Module Structure
//!
//! - `record`: usage records and aggregates
//! - `ledger`: `UsageStore` seam + in-memory ledger
//! - `aggregator`: windowed recomputation with a TTL cache
//! - `forecast`: cost/usage projection with confidence
//! - `alert`: threshold and anomaly detection
//! - `recommend`: advisory optimization suggestions
//! - `report`: plain-text usage report

mod aggregator;
mod alert;
mod forecast;
mod ledger;
mod record;
mod recommend;
mod report;

#[cfg(test)]
mod tests;

pub use aggregator::{fold_records, AggregateWindow, UsageAggregator};
pub use alert::{AlertEngine, AlertKind, AlertSeverity, UsageAlert};
pub use forecast::{project, CostForecast, ForecastPeriod, Forecaster, MAX_CONFIDENCE};
pub use ledger::{LedgerTotals, MemoryLedger, UsageStore};
pub use record::{cost_of, BackendUsage, UsageAggregate, UsageRecord};
pub use recommend::{OptimizationRecommendation, RecommendationEngine, RecommendationKind};
pub use report::format_usage_report;
