//! Types produced and consumed by the selection engine

use crate::registry::BackendDescriptor;
use crate::usage::UsageAggregate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Budget Constraint
// ============================================================================

/// Derived spending state, from proximity to the caller's thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetConstraint {
    /// Spending is comfortably inside the thresholds
    None,
    /// Above the soft baseline; weighted rules shift toward cost
    Moderate,
    /// At or past the strict ratio of the monthly threshold; only low-cost
    /// backends are eligible
    Strict,
}

impl BudgetConstraint {
    /// Whether any constraint is in effect
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        !matches!(self, Self::None)
    }
}

// ============================================================================
// Caller Usage State
// ============================================================================

/// Month-to-date usage for one caller, read from the Aggregator
///
/// A missing or failed read degrades to the zero state: budget enforcement
/// is best-effort, serving the request is not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallerUsageState {
    /// Cost accumulated this calendar month (USD)
    pub month_to_date_cost: f64,
    /// Units consumed this calendar month
    pub month_to_date_units: u64,
    /// Requests made this calendar month
    pub month_to_date_requests: u64,
}

impl CallerUsageState {
    /// Project the usage state out of a month-to-date aggregate
    #[must_use]
    pub fn from_aggregate(aggregate: &UsageAggregate) -> Self {
        Self {
            month_to_date_cost: aggregate.total_cost,
            month_to_date_units: aggregate.total_units,
            month_to_date_requests: aggregate.total_requests,
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Which selection rule produced the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// Critical urgency: top quality regardless of cost
    CriticalQuality,
    /// High urgency: best quality-per-latency under the latency ceiling
    HighUrgencyLatency,
    /// Strict budget: cheapest among low-cost backends
    StrictBudgetCheapest,
    /// Free tier: cheapest input cost
    FreeTierCheapest,
    /// Pro tier: quality/cost weighted score
    ProWeighted,
    /// Complex task or cultural context: top quality
    ComplexQuality,
    /// Default: quality, latency and cost weighted score
    WeightedDefault,
}

/// The outcome of one selection pass
#[derive(Debug, Clone)]
pub struct Selection {
    /// Chosen backend
    pub backend: BackendDescriptor,
    /// Rule that fired
    pub rule: SelectionRule,
    /// Budget constraint in effect during selection
    pub constraint: BudgetConstraint,
}
