//! Usage Ledger
//!
//! Append-only persistence seam for [`UsageRecord`]s, plus the in-memory
//! implementation used in tests and single-node deployments. Inserts need
//! no mutual exclusion beyond the store's own guarantee: aggregation is
//! commutative over records, and a rare duplicate append under a race is an
//! auditable imperfection, not a correctness violation.

use super::record::UsageRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

/// Append-only store for usage records
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Append one record
    async fn append(&self, record: UsageRecord) -> Result<()>;

    /// Records for `caller_id` with `from <= timestamp < to`, ordered by
    /// (timestamp, id)
    async fn query(
        &self,
        caller_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>>;
}

/// Running ledger totals for display surfaces
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerTotals {
    /// Records appended
    pub records: u64,
    /// Units consumed across all callers
    pub total_units: u64,
    /// Cost across all callers (USD)
    pub total_cost: f64,
    /// Failed attempts
    pub failed: u64,
}

/// In-memory append-only ledger
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<UsageRecord>>,
}

impl MemoryLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records appended so far
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the ledger is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of all records, for tests and offline inspection
    pub async fn all(&self) -> Vec<UsageRecord> {
        self.records.read().await.clone()
    }

    /// Non-blocking totals snapshot (for render loops).
    /// Returns `None` if the lock is held by another task.
    #[must_use]
    pub fn try_totals(&self) -> Option<LedgerTotals> {
        let records = self.records.try_read().ok()?;
        let mut totals = LedgerTotals::default();
        for record in records.iter() {
            totals.records += 1;
            totals.total_units += record.total_units;
            totals.total_cost += record.total_cost;
            if !record.success {
                totals.failed += 1;
            }
        }
        Some(totals)
    }
}

#[async_trait]
impl UsageStore for MemoryLedger {
    async fn append(&self, record: UsageRecord) -> Result<()> {
        debug!(
            caller = %record.caller_id,
            backend = %record.backend_id,
            cost = record.total_cost,
            success = record.success,
            "usage record appended"
        );
        self.records.write().await.push(record);
        Ok(())
    }

    async fn query(
        &self,
        caller_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>> {
        let records = self.records.read().await;
        let mut matched: Vec<UsageRecord> = records
            .iter()
            .filter(|r| r.caller_id == caller_id && r.timestamp >= from && r.timestamp < to)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(matched)
    }
}
