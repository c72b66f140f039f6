//! Recommendation Engine
//!
//! Advisory, non-blocking suggestions derived from aggregated usage. A
//! recommendation never changes routing: the selection policy enforces
//! budgets on its own, and nothing here flows back into it.

use super::aggregator::{AggregateWindow, UsageAggregator};
use crate::config::RecommendationConfig;
use crate::registry::{BackendDescriptor, ModelRegistry};
use crate::request::SubscriptionTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

// ============================================================================
// Recommendation Types
// ============================================================================

/// What kind of change the recommendation suggests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Substitute a dominant backend with a cheaper capable one
    ModelDowngrade,
    /// Move to a cheaper or richer subscription tier
    PlanChange,
    /// Usage concentration worth a look, with no direct saving attached
    UsagePattern,
}

/// One advisory suggestion; never authoritative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    /// Recommendation id
    pub id: Uuid,
    /// Caller the suggestion is for
    pub caller_id: String,
    /// Kind of change suggested
    pub kind: RecommendationKind,
    /// Short title
    pub title: String,
    /// Longer description
    pub description: String,
    /// Estimated monthly savings (USD); 0 when the motivation is value
    pub potential_savings: f64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Priority for caller-side ranking; lower is more important
    pub priority: u8,
    /// Suggested next steps
    pub actions: Vec<String>,
}

// ============================================================================
// Recommendation Engine
// ============================================================================

/// Derives recommendations from the monthly aggregate and the registry
pub struct RecommendationEngine {
    aggregator: Arc<UsageAggregator>,
    registry: Arc<ModelRegistry>,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    /// Create a recommendation engine
    #[must_use]
    pub fn new(
        aggregator: Arc<UsageAggregator>,
        registry: Arc<ModelRegistry>,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            aggregator,
            registry,
            config,
        }
    }

    /// Recommendations for one caller; triggers are independent and
    /// non-exclusive. Failures degrade to an empty list.
    pub async fn recommendations(
        &self,
        caller_id: &str,
        tier: SubscriptionTier,
        now: DateTime<Utc>,
    ) -> Vec<OptimizationRecommendation> {
        let month = match self
            .aggregator
            .aggregate(caller_id, AggregateWindow::MonthToDate, now)
            .await
        {
            Ok(aggregate) => aggregate,
            Err(e) => {
                warn!(caller = %caller_id, error = %e, "recommendation evaluation skipped");
                return Vec::new();
            }
        };

        let mut recommendations = Vec::new();

        if month.total_cost > 0.0 {
            if let Some((dominant_id, usage)) = month
                .per_backend
                .iter()
                .max_by(|a, b| a.1.total_cost.total_cmp(&b.1.total_cost))
            {
                let share = usage.total_cost / month.total_cost;
                if share > self.config.dominance_share {
                    let snapshot = self.registry.snapshot().await;
                    match snapshot.get(dominant_id).and_then(|dominant| {
                        cheapest_alternative(snapshot.backends(), dominant)
                            .map(|alt| (dominant.clone(), alt.clone()))
                    }) {
                        Some((dominant, alternative)) => {
                            let rate_delta = dominant.combined_unit_cost()
                                - alternative.combined_unit_cost();
                            let savings = usage.total_units as f64
                                * rate_delta
                                * self.config.savings_damping;
                            recommendations.push(OptimizationRecommendation {
                                id: Uuid::new_v4(),
                                caller_id: caller_id.to_string(),
                                kind: RecommendationKind::ModelDowngrade,
                                title: format!(
                                    "Route more traffic to {}",
                                    alternative.display_name
                                ),
                                description: format!(
                                    "{} served {:.0}% of this month's cost; {} covers the same \
                                     tasks at a lower unit rate (est. ${:.2} saving)",
                                    dominant.display_name,
                                    share * 100.0,
                                    alternative.display_name,
                                    savings
                                ),
                                potential_savings: savings,
                                confidence: share.min(0.9),
                                priority: 1,
                                actions: vec![format!(
                                    "prefer backend {} for routine tasks",
                                    alternative.id
                                )],
                            });
                        }
                        None => {
                            recommendations.push(OptimizationRecommendation {
                                id: Uuid::new_v4(),
                                caller_id: caller_id.to_string(),
                                kind: RecommendationKind::UsagePattern,
                                title: "Usage concentrated on one backend".to_string(),
                                description: format!(
                                    "{:.0}% of this month's cost went to {} and no cheaper \
                                     capable alternative is registered",
                                    share * 100.0,
                                    dominant_id
                                ),
                                potential_savings: 0.0,
                                confidence: share.min(0.9),
                                priority: 3,
                                actions: vec!["review the backend fleet".to_string()],
                            });
                        }
                    }
                }
            }
        }

        if tier.is_paid() && month.total_cost < self.config.low_spend_threshold {
            recommendations.push(OptimizationRecommendation {
                id: Uuid::new_v4(),
                caller_id: caller_id.to_string(),
                kind: RecommendationKind::PlanChange,
                title: "Plan looks oversized".to_string(),
                description: format!(
                    "Month-to-date cost is ${:.2}; a smaller plan would cover this usage",
                    month.total_cost
                ),
                potential_savings: 0.0,
                confidence: 0.6,
                priority: 2,
                actions: vec!["consider a lower tier".to_string()],
            });
        }

        if tier == SubscriptionTier::Free
            && month.total_requests > self.config.high_volume_requests
        {
            recommendations.push(OptimizationRecommendation {
                id: Uuid::new_v4(),
                caller_id: caller_id.to_string(),
                kind: RecommendationKind::PlanChange,
                title: "Heavy use of the free plan".to_string(),
                description: format!(
                    "{} requests this month; a paid plan unlocks better backends",
                    month.total_requests
                ),
                potential_savings: 0.0,
                confidence: 0.7,
                priority: 3,
                actions: vec!["consider upgrading".to_string()],
            });
        }

        recommendations
    }
}

/// Cheapest available backend that covers everything the dominant one does
fn cheapest_alternative<'a>(
    backends: &'a [BackendDescriptor],
    dominant: &BackendDescriptor,
) -> Option<&'a BackendDescriptor> {
    backends
        .iter()
        .filter(|b| {
            b.available
                && b.id != dominant.id
                && b.capabilities.is_superset(&dominant.capabilities)
                && b.combined_unit_cost() < dominant.combined_unit_cost()
        })
        .min_by(|a, b| {
            a.combined_unit_cost()
                .total_cmp(&b.combined_unit_cost())
                .then(a.id.cmp(&b.id))
        })
}
