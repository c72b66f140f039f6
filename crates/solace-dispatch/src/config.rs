//! Engine configuration
//!
//! Typed, enumerated fields with documented defaults, validated at load.
//! Configuration is read-only from the engine's perspective: the host
//! application deserializes it from wherever it keeps settings and hands it
//! to [`crate::engine::DispatchEngine::new`], which calls
//! [`EngineConfig::validate`] before anything else runs.

use crate::error::{Error, Result};
use crate::request::SubscriptionTier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Selection
// ============================================================================

/// Weights for the composite selection score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Weight of the backend's quality score
    pub quality: f64,
    /// Weight of inverse cost
    pub cost: f64,
    /// Weight of inverse latency
    pub latency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            quality: 0.5,
            cost: 0.3,
            latency: 0.2,
        }
    }
}

/// Knobs for the Selection Policy Engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum quality score for critical-urgency requests (exclusive)
    pub critical_quality_floor: f64,
    /// Latency ceiling applied to high-urgency requests (exclusive, ms)
    pub high_urgency_latency_ceiling_ms: u64,
    /// Fraction of the monthly cost threshold at which the budget
    /// constraint becomes strict
    pub strict_budget_ratio: f64,
    /// Month-to-date cost (USD) above which non-crisis requests are
    /// moderately constrained
    pub soft_cost_baseline: f64,
    /// "Low-cost" cutoff under a strict constraint (USD per input unit)
    pub low_cost_ceiling: f64,
    /// Weights for the weighted selection rules
    pub weights: ScoreWeights,
    /// Multiplier applied to the cost weight while constrained
    pub constrained_cost_weight_boost: f64,
    /// Per-tier ceiling on a backend's output-unit cost (USD per unit).
    /// Tiers absent from the map are unconstrained. Relaxed if it would
    /// leave no candidate; skipped entirely for critical urgency.
    pub tier_cost_ceilings: HashMap<SubscriptionTier, f64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let mut tier_cost_ceilings = HashMap::new();
        tier_cost_ceilings.insert(SubscriptionTier::Free, 0.00008);
        tier_cost_ceilings.insert(SubscriptionTier::Pro, 0.0004);
        Self {
            critical_quality_floor: 0.9,
            high_urgency_latency_ceiling_ms: 2_000,
            strict_budget_ratio: 0.8,
            soft_cost_baseline: 25.0,
            low_cost_ceiling: 0.00005,
            weights: ScoreWeights::default(),
            constrained_cost_weight_boost: 3.0,
            tier_cost_ceilings,
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Knobs for the Dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Bounded wait for a single backend call (ms)
    pub call_timeout_ms: u64,
    /// Safe reply returned when both dispatch attempts fail
    pub degraded_message: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            degraded_message:
                "I'm having trouble responding right now. Please try again in a moment."
                    .to_string(),
        }
    }
}

// ============================================================================
// Usage & Alerting
// ============================================================================

/// Per-caller spending and usage limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerThresholds {
    /// Monthly cost threshold (USD)
    pub monthly_cost_threshold: f64,
    /// Monthly usage threshold (units)
    pub monthly_usage_threshold: f64,
}

impl Default for CallerThresholds {
    fn default() -> Self {
        Self {
            monthly_cost_threshold: 100.0,
            monthly_usage_threshold: 2_000_000.0,
        }
    }
}

/// Knobs for the Ledger-derived views: aggregation, alerting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// TTL for cached aggregates (seconds); 0 disables the cache
    pub aggregate_cache_ttl_secs: u64,
    /// Anomaly alert fires when today's cost exceeds this multiple of the
    /// daily forecast
    pub anomaly_multiplier: f64,
    /// Thresholds applied to callers without an explicit entry
    pub default_thresholds: CallerThresholds,
    /// Per-caller threshold overrides
    pub caller_thresholds: HashMap<String, CallerThresholds>,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            aggregate_cache_ttl_secs: 60,
            anomaly_multiplier: 2.0,
            default_thresholds: CallerThresholds::default(),
            caller_thresholds: HashMap::new(),
        }
    }
}

impl UsageConfig {
    /// Thresholds for a caller, falling back to the defaults
    #[must_use]
    pub fn thresholds_for(&self, caller_id: &str) -> &CallerThresholds {
        self.caller_thresholds
            .get(caller_id)
            .unwrap_or(&self.default_thresholds)
    }
}

// ============================================================================
// Recommendations
// ============================================================================

/// Knobs for the advisory Recommendation Engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Cost share above which a single backend counts as dominant
    pub dominance_share: f64,
    /// Damping factor applied to historical savings estimates
    pub savings_damping: f64,
    /// Month-to-date cost (USD) below which a paid tier looks oversized
    pub low_spend_threshold: f64,
    /// Monthly request count above which a free tier looks undersized
    pub high_volume_requests: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            dominance_share: 0.8,
            savings_damping: 0.6,
            low_spend_threshold: 5.0,
            high_volume_requests: 500,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selection policy knobs
    pub selection: SelectionConfig,
    /// Dispatcher knobs
    pub dispatch: DispatchConfig,
    /// Aggregation and alerting knobs
    pub usage: UsageConfig,
    /// Recommendation knobs
    pub recommendation: RecommendationConfig,
}

impl EngineConfig {
    /// Validate the configuration, rejecting values the policy math cannot
    /// work with
    pub fn validate(&self) -> Result<()> {
        let s = &self.selection;
        if !(0.0..=1.0).contains(&s.critical_quality_floor) {
            return Err(Error::InvalidConfig(
                "critical_quality_floor must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&s.strict_budget_ratio) || s.strict_budget_ratio == 0.0 {
            return Err(Error::InvalidConfig(
                "strict_budget_ratio must be within (0, 1]".into(),
            ));
        }
        if s.high_urgency_latency_ceiling_ms == 0 {
            return Err(Error::InvalidConfig(
                "high_urgency_latency_ceiling_ms must be positive".into(),
            ));
        }
        if s.low_cost_ceiling <= 0.0 {
            return Err(Error::InvalidConfig(
                "low_cost_ceiling must be positive".into(),
            ));
        }
        let w = &s.weights;
        if w.quality < 0.0 || w.cost < 0.0 || w.latency < 0.0 {
            return Err(Error::InvalidConfig("weights must be non-negative".into()));
        }
        if w.quality + w.cost + w.latency == 0.0 {
            return Err(Error::InvalidConfig(
                "at least one weight must be positive".into(),
            ));
        }
        if s.constrained_cost_weight_boost < 1.0 {
            return Err(Error::InvalidConfig(
                "constrained_cost_weight_boost must be >= 1".into(),
            ));
        }
        if self.dispatch.call_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "call_timeout_ms must be positive".into(),
            ));
        }
        if self.usage.anomaly_multiplier <= 1.0 {
            return Err(Error::InvalidConfig(
                "anomaly_multiplier must be greater than 1".into(),
            ));
        }
        let r = &self.recommendation;
        if !(0.0..=1.0).contains(&r.dominance_share) || r.dominance_share == 0.0 {
            return Err(Error::InvalidConfig(
                "dominance_share must be within (0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&r.savings_damping) || r.savings_damping == 0.0 {
            return Err(Error::InvalidConfig(
                "savings_damping must be within (0, 1]".into(),
            ));
        }
        Ok(())
    }
}
