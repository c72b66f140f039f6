//! Usage records and aggregates

use crate::registry::BackendDescriptor;
use crate::request::{RequestDescriptor, SubscriptionTier, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Cost of a call at a backend's unit prices
///
/// Costs are USD per unit, kept at full f64 precision; rounding to currency
/// minor units happens only at presentation.
#[must_use]
pub fn cost_of(backend: &BackendDescriptor, input_units: u64, output_units: u64) -> f64 {
    input_units as f64 * backend.cost_per_input_unit
        + output_units as f64 * backend.cost_per_output_unit
}

// ============================================================================
// Usage Record
// ============================================================================

/// One real backend call attempt, success or failure
///
/// Append-only and owned exclusively by the Ledger; everything else derives
/// from these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Record id
    pub id: Uuid,
    /// Caller billed for the call
    pub caller_id: String,
    /// Session the call belonged to, if known
    pub session_id: Option<String>,
    /// Backend that served (or failed) the call
    pub backend_id: String,
    /// Provider family of the backend
    pub provider_family: String,
    /// Task type of the originating request
    pub task_type: TaskType,
    /// Input units the provider reported
    pub input_units: u64,
    /// Output units the provider reported
    pub output_units: u64,
    /// Input + output units
    pub total_units: u64,
    /// Effective blended USD per unit (0 when no units were consumed)
    pub unit_cost: f64,
    /// Total cost (USD), full precision
    pub total_cost: f64,
    /// Wall-clock latency of the attempt (ms)
    pub response_time_ms: u64,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Caller's tier at the time of the call
    pub subscription_tier: SubscriptionTier,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
    /// Free-form annotations (e.g. "cancelled", "timeout")
    pub metadata: BTreeMap<String, String>,
}

impl UsageRecord {
    /// Build a record for one dispatch attempt
    #[must_use]
    pub fn from_attempt(
        request: &RequestDescriptor,
        backend: &BackendDescriptor,
        input_units: u64,
        output_units: u64,
        response_time_ms: u64,
        success: bool,
    ) -> Self {
        let total_units = input_units + output_units;
        let total_cost = cost_of(backend, input_units, output_units);
        let unit_cost = if total_units > 0 {
            total_cost / total_units as f64
        } else {
            0.0
        };

        Self {
            id: Uuid::new_v4(),
            caller_id: request.caller_id.clone(),
            session_id: request.session_id.clone(),
            backend_id: backend.id.clone(),
            provider_family: backend.provider_family.clone(),
            task_type: request.task_type,
            input_units,
            output_units,
            total_units,
            unit_cost,
            total_cost,
            response_time_ms,
            success,
            subscription_tier: request.subscription_tier,
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata annotation
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Usage Aggregate
// ============================================================================

/// Per-backend slice of an aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendUsage {
    /// Call attempts against this backend
    pub requests: u64,
    /// Units consumed
    pub total_units: u64,
    /// Cost (USD)
    pub total_cost: f64,
}

/// Rolling usage summary for one caller over a time window
///
/// Derived from the ledger, never mutated in place. `per_backend` is a
/// `BTreeMap` so recomputing over unchanged ledger content serializes
/// byte-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAggregate {
    /// Caller the window belongs to
    pub caller_id: String,
    /// Window start (inclusive)
    pub window_start: DateTime<Utc>,
    /// Window end (exclusive)
    pub window_end: DateTime<Utc>,
    /// Call attempts in the window
    pub total_requests: u64,
    /// Units consumed in the window
    pub total_units: u64,
    /// Cost in the window (USD)
    pub total_cost: f64,
    /// Mean attempt latency (ms)
    pub avg_response_time_ms: f64,
    /// Breakdown by backend id
    pub per_backend: BTreeMap<String, BackendUsage>,
}
