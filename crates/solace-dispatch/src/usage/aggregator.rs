//! Usage Aggregator
//!
//! Recomputes rolling per-caller metrics from the ledger. Aggregation is a
//! pure fold over the queried records: recomputing over unchanged ledger
//! content is idempotent and byte-identical. Results may be cached with a
//! TTL but are never authoritative.

use super::ledger::UsageStore;
use super::record::{UsageAggregate, UsageRecord};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::Result;

// ============================================================================
// Windows
// ============================================================================

/// Time window an aggregate covers, anchored at `now`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateWindow {
    /// Trailing 24 hours
    Day,
    /// Trailing 7 days
    Week,
    /// Trailing 30 days
    Month,
    /// Midnight (UTC) to now
    Today,
    /// First of the calendar month (UTC) to now
    MonthToDate,
}

impl AggregateWindow {
    /// Window bounds as `[start, end)`
    #[must_use]
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self {
            Self::Day => now - ChronoDuration::days(1),
            Self::Week => now - ChronoDuration::days(7),
            Self::Month => now - ChronoDuration::days(30),
            Self::Today => start_of_day(now),
            Self::MonthToDate => start_of_month(now),
        };
        (start, now)
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

// ============================================================================
// Folding
// ============================================================================

/// Fold ledger records into an aggregate
///
/// Records are expected in the store's (timestamp, id) order, which keeps
/// floating-point summation deterministic across recomputations.
#[must_use]
pub fn fold_records(
    caller_id: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    records: &[UsageRecord],
) -> UsageAggregate {
    let mut aggregate = UsageAggregate {
        caller_id: caller_id.to_string(),
        window_start,
        window_end,
        total_requests: 0,
        total_units: 0,
        total_cost: 0.0,
        avg_response_time_ms: 0.0,
        per_backend: Default::default(),
    };

    let mut latency_total: u64 = 0;
    for record in records {
        aggregate.total_requests += 1;
        aggregate.total_units += record.total_units;
        aggregate.total_cost += record.total_cost;
        latency_total += record.response_time_ms;

        let slot = aggregate
            .per_backend
            .entry(record.backend_id.clone())
            .or_default();
        slot.requests += 1;
        slot.total_units += record.total_units;
        slot.total_cost += record.total_cost;
    }

    if !records.is_empty() {
        aggregate.avg_response_time_ms = latency_total as f64 / records.len() as f64;
    }

    aggregate
}

// ============================================================================
// Aggregator
// ============================================================================

struct CachedAggregate {
    computed_at: Instant,
    aggregate: UsageAggregate,
}

/// Recomputes windowed aggregates from the ledger, with a TTL cache
pub struct UsageAggregator {
    store: Arc<dyn UsageStore>,
    cache_ttl: Duration,
    cache: RwLock<HashMap<(String, AggregateWindow), CachedAggregate>>,
}

impl UsageAggregator {
    /// Create an aggregator; `cache_ttl` of zero disables caching
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache_ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Aggregate a caller's usage over a window anchored at `now`
    pub async fn aggregate(
        &self,
        caller_id: &str,
        window: AggregateWindow,
        now: DateTime<Utc>,
    ) -> Result<UsageAggregate> {
        let key = (caller_id.to_string(), window);

        if !self.cache_ttl.is_zero() {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&key) {
                if cached.computed_at.elapsed() < self.cache_ttl {
                    return Ok(cached.aggregate.clone());
                }
            }
        }

        let (from, to) = window.bounds(now);
        let records = self.store.query(caller_id, from, to).await?;
        let aggregate = fold_records(caller_id, from, to, &records);

        if !self.cache_ttl.is_zero() {
            self.cache.write().await.insert(
                key,
                CachedAggregate {
                    computed_at: Instant::now(),
                    aggregate: aggregate.clone(),
                },
            );
        }

        Ok(aggregate)
    }
}
