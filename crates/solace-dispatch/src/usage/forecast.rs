//! Cost Forecaster
//!
//! Projects future cost and usage from historical ledger records. The
//! projection is intentionally plain: mean daily cost over a lookback
//! window scaled to the target period, with confidence growing as observed
//! history fills the lookback. Zero history yields an explicit zero
//! forecast, never an error.

use super::ledger::UsageStore;
use super::record::UsageRecord;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

/// Confidence is capped here no matter how much history exists
pub const MAX_CONFIDENCE: f64 = 0.95;

// ============================================================================
// Periods
// ============================================================================

/// Forecast horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastPeriod {
    /// Next day, from a 7-day lookback
    Daily,
    /// Next 7 days, from a 28-day lookback
    Weekly,
    /// Next 30 days, from a 90-day lookback
    Monthly,
}

impl ForecastPeriod {
    /// Days of history consulted
    #[must_use]
    pub fn lookback_days(&self) -> i64 {
        match self {
            Self::Daily => 7,
            Self::Weekly => 28,
            Self::Monthly => 90,
        }
    }

    /// Days the forecast covers
    #[must_use]
    pub fn horizon_days(&self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }
}

// ============================================================================
// Forecast
// ============================================================================

/// Projected cost and usage for one caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostForecast {
    /// Caller the forecast is for
    pub caller_id: String,
    /// Horizon of the projection
    pub period: ForecastPeriod,
    /// Projected cost over the horizon (USD)
    pub predicted_cost: f64,
    /// Projected units over the horizon
    pub predicted_units: f64,
    /// Confidence in [0, 0.95], growing with observed history
    pub confidence: f64,
    /// Projected cost split by backend, proportional to historical share
    pub per_backend: BTreeMap<String, f64>,
}

impl CostForecast {
    /// The zero forecast returned when there is no history
    #[must_use]
    pub fn empty(caller_id: impl Into<String>, period: ForecastPeriod) -> Self {
        Self {
            caller_id: caller_id.into(),
            period,
            predicted_cost: 0.0,
            predicted_units: 0.0,
            confidence: 0.0,
            per_backend: BTreeMap::new(),
        }
    }
}

/// Project a forecast from historical records
///
/// Pure function; the async wrapper only fetches the records.
#[must_use]
pub fn project(caller_id: &str, period: ForecastPeriod, records: &[UsageRecord]) -> CostForecast {
    if records.is_empty() {
        return CostForecast::empty(caller_id, period);
    }

    let observed_days: BTreeSet<NaiveDate> =
        records.iter().map(|r| r.timestamp.date_naive()).collect();
    let observed = observed_days.len() as f64;

    let total_cost: f64 = records.iter().map(|r| r.total_cost).sum();
    let total_units: u64 = records.iter().map(|r| r.total_units).sum();

    let horizon = period.horizon_days() as f64;
    let predicted_cost = total_cost / observed * horizon;
    let predicted_units = total_units as f64 / observed * horizon;
    let confidence = (observed / period.lookback_days() as f64).min(MAX_CONFIDENCE);

    let mut per_backend = BTreeMap::new();
    if total_cost > 0.0 {
        let mut by_backend: BTreeMap<String, f64> = BTreeMap::new();
        for record in records {
            *by_backend.entry(record.backend_id.clone()).or_default() += record.total_cost;
        }
        for (backend_id, cost) in by_backend {
            per_backend.insert(backend_id, cost / total_cost * predicted_cost);
        }
    }

    CostForecast {
        caller_id: caller_id.to_string(),
        period,
        predicted_cost,
        predicted_units,
        confidence,
        per_backend,
    }
}

// ============================================================================
// Forecaster
// ============================================================================

/// Reads history from the ledger and projects forward
pub struct Forecaster {
    store: Arc<dyn UsageStore>,
}

impl Forecaster {
    /// Create a forecaster over a store
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Forecast a caller's cost over the given period
    ///
    /// Soft by design: a store failure degrades to the zero forecast with a
    /// warning instead of surfacing an error.
    pub async fn cost_forecast(
        &self,
        caller_id: &str,
        period: ForecastPeriod,
        now: DateTime<Utc>,
    ) -> CostForecast {
        let from = now - ChronoDuration::days(period.lookback_days());
        match self.store.query(caller_id, from, now).await {
            Ok(records) => project(caller_id, period, &records),
            Err(e) => {
                warn!(caller = %caller_id, error = %e, "forecast history unavailable");
                CostForecast::empty(caller_id, period)
            }
        }
    }
}
