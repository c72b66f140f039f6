//! Ranked-choice backend selection

use super::types::{BudgetConstraint, CallerUsageState, Selection, SelectionRule};
use crate::config::{CallerThresholds, SelectionConfig};
use crate::error::{Error, Result};
use crate::registry::BackendDescriptor;
use crate::request::{Complexity, RequestDescriptor, SubscriptionTier, TaskType, Urgency};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Deterministic backend selector
///
/// Restrictions are applied in order; any restriction that would empty the
/// candidate pool is relaxed instead. Only an empty pool at entry is fatal.
pub struct SelectionEngine {
    config: SelectionConfig,
}

impl SelectionEngine {
    /// Create a selection engine
    #[must_use]
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    /// Derive the caller's budget constraint from month-to-date spend
    #[must_use]
    pub fn budget_constraint(
        &self,
        task_type: TaskType,
        usage: &CallerUsageState,
        thresholds: &CallerThresholds,
    ) -> BudgetConstraint {
        let cost_threshold = thresholds.monthly_cost_threshold;
        if cost_threshold > 0.0
            && usage.month_to_date_cost >= self.config.strict_budget_ratio * cost_threshold
        {
            return BudgetConstraint::Strict;
        }
        if usage.month_to_date_cost > self.config.soft_cost_baseline
            && task_type != TaskType::Crisis
        {
            return BudgetConstraint::Moderate;
        }
        BudgetConstraint::None
    }

    /// Select one backend for the request
    pub fn select(
        &self,
        request: &RequestDescriptor,
        candidates: &[BackendDescriptor],
        usage: &CallerUsageState,
        thresholds: &CallerThresholds,
    ) -> Result<Selection> {
        self.select_excluding(request, candidates, usage, thresholds, None)
    }

    /// Select one backend, optionally excluding one (fallback re-selection)
    pub fn select_excluding(
        &self,
        request: &RequestDescriptor,
        candidates: &[BackendDescriptor],
        usage: &CallerUsageState,
        thresholds: &CallerThresholds,
        exclude: Option<&str>,
    ) -> Result<Selection> {
        let mut pool: Vec<&BackendDescriptor> = candidates
            .iter()
            .filter(|b| b.available && b.supports(request.task_type))
            .filter(|b| exclude != Some(b.id.as_str()))
            .collect();
        pool.sort_by(|a, b| a.id.cmp(&b.id));

        if pool.is_empty() {
            return Err(Error::NoCandidates(request.task_type));
        }

        let constraint = self.budget_constraint(request.task_type, usage, thresholds);
        let selection = self.rank(request, pool, constraint);

        info!(
            caller = %request.caller_id,
            task = %request.task_type,
            urgency = ?request.urgency,
            backend = %selection.backend.id,
            rule = ?selection.rule,
            constraint = ?selection.constraint,
            "selected backend"
        );

        Ok(selection)
    }

    fn rank<'a>(
        &self,
        request: &RequestDescriptor,
        mut pool: Vec<&'a BackendDescriptor>,
        constraint: BudgetConstraint,
    ) -> Selection {
        // Critical urgency: safety overrides cost, tier ceilings included.
        if request.urgency == Urgency::Critical {
            let floor = self.config.critical_quality_floor;
            pool = self.restrict(pool, |b| b.quality_score > floor, "critical_quality_floor");
            let backend = pick_best(&pool, |a, b| {
                a.quality_score
                    .total_cmp(&b.quality_score)
                    .then(b.average_latency_ms.cmp(&a.average_latency_ms))
            });
            return self.decided(backend, SelectionRule::CriticalQuality, constraint);
        }

        // Tier ceiling on output-unit cost, relaxable.
        if let Some(ceiling) = self.config.tier_cost_ceilings.get(&request.subscription_tier) {
            pool = self.restrict(
                pool,
                |b| b.cost_per_output_unit <= *ceiling,
                "tier_cost_ceiling",
            );
        }

        if request.urgency == Urgency::High {
            let ceiling = self.config.high_urgency_latency_ceiling_ms;
            pool = self.restrict(
                pool,
                |b| b.average_latency_ms < ceiling,
                "latency_ceiling",
            );
            let backend = pick_best(&pool, |a, b| {
                quality_per_latency(a).total_cmp(&quality_per_latency(b))
            });
            return self.decided(backend, SelectionRule::HighUrgencyLatency, constraint);
        }

        if constraint == BudgetConstraint::Strict {
            let ceiling = self.config.low_cost_ceiling;
            pool = self.restrict(pool, |b| b.cost_per_input_unit <= ceiling, "low_cost");
            let backend = pick_best(&pool, |a, b| {
                b.cost_per_input_unit.total_cmp(&a.cost_per_input_unit)
            });
            return self.decided(backend, SelectionRule::StrictBudgetCheapest, constraint);
        }

        if request.subscription_tier == SubscriptionTier::Free {
            let backend = pick_best(&pool, |a, b| {
                b.cost_per_input_unit.total_cmp(&a.cost_per_input_unit)
            });
            return self.decided(backend, SelectionRule::FreeTierCheapest, constraint);
        }

        if request.subscription_tier == SubscriptionTier::Pro {
            let scores = self.weighted_scores(&pool, constraint, false);
            let backend = pick_scored(&pool, &scores);
            return self.decided(backend, SelectionRule::ProWeighted, constraint);
        }

        if request.complexity == Complexity::Complex || request.cultural_context.is_some() {
            let constrained = constraint.is_constrained();
            let backend = pick_best(&pool, |a, b| {
                a.quality_score.total_cmp(&b.quality_score).then(
                    if constrained {
                        b.combined_unit_cost().total_cmp(&a.combined_unit_cost())
                    } else {
                        Ordering::Equal
                    },
                )
            });
            return self.decided(backend, SelectionRule::ComplexQuality, constraint);
        }

        let scores = self.weighted_scores(&pool, constraint, true);
        let backend = pick_scored(&pool, &scores);
        self.decided(backend, SelectionRule::WeightedDefault, constraint)
    }

    /// Apply a restriction, relaxing it if it would empty the pool
    fn restrict<'a>(
        &self,
        pool: Vec<&'a BackendDescriptor>,
        pred: impl Fn(&BackendDescriptor) -> bool,
        label: &str,
    ) -> Vec<&'a BackendDescriptor> {
        let kept: Vec<&BackendDescriptor> = pool.iter().copied().filter(|b| pred(b)).collect();
        if kept.is_empty() {
            debug!(restriction = label, "restriction emptied candidate pool, relaxing");
            pool
        } else {
            kept
        }
    }

    /// Composite scores, min-max normalized per dimension across the pool so
    /// the weights stay meaningful regardless of absolute magnitudes
    fn weighted_scores(
        &self,
        pool: &[&BackendDescriptor],
        constraint: BudgetConstraint,
        include_latency: bool,
    ) -> Vec<f64> {
        let w = &self.config.weights;
        let cost_weight = if constraint.is_constrained() {
            w.cost * self.config.constrained_cost_weight_boost
        } else {
            w.cost
        };

        let quality = normalize(pool, |b| b.quality_score, true);
        let cheapness = normalize(pool, BackendDescriptor::combined_unit_cost, false);
        let swiftness = normalize(pool, |b| b.average_latency_ms as f64, false);

        pool.iter()
            .enumerate()
            .map(|(i, _)| {
                let mut score = quality[i] * w.quality + cheapness[i] * cost_weight;
                if include_latency {
                    score += swiftness[i] * w.latency;
                }
                score
            })
            .collect()
    }

    fn decided(
        &self,
        backend: &BackendDescriptor,
        rule: SelectionRule,
        constraint: BudgetConstraint,
    ) -> Selection {
        Selection {
            backend: backend.clone(),
            rule,
            constraint,
        }
    }
}

/// Quality per millisecond of expected latency
fn quality_per_latency(b: &BackendDescriptor) -> f64 {
    b.quality_score / b.average_latency_ms.max(1) as f64
}

/// Min-max normalize one dimension over the pool to [0, 1]
///
/// `ascending` marks dimensions where bigger raw values are better. A flat
/// dimension contributes equally for every candidate, leaving the decision
/// to the other dimensions and the id tie-break.
fn normalize(
    pool: &[&BackendDescriptor],
    dim: impl Fn(&BackendDescriptor) -> f64,
    ascending: bool,
) -> Vec<f64> {
    let values: Vec<f64> = pool.iter().map(|b| dim(b)).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    values
        .iter()
        .map(|v| {
            if spread <= 0.0 {
                1.0
            } else if ascending {
                (v - min) / spread
            } else {
                (max - v) / spread
            }
        })
        .collect()
}

/// First backend (in id order) that no other backend strictly beats
///
/// `better(a, b) == Greater` means `a` ranks above `b`. The pool is already
/// id-sorted, so ties resolve to the lowest id.
fn pick_best<'a>(
    pool: &[&'a BackendDescriptor],
    better: impl Fn(&BackendDescriptor, &BackendDescriptor) -> Ordering,
) -> &'a BackendDescriptor {
    let mut best = pool[0];
    for candidate in pool.iter().skip(1).copied() {
        if better(candidate, best) == Ordering::Greater {
            best = candidate;
        }
    }
    best
}

/// Highest-scored backend, lowest id among score ties
fn pick_scored<'a>(pool: &[&'a BackendDescriptor], scores: &[f64]) -> &'a BackendDescriptor {
    let mut best = 0;
    for i in 1..pool.len() {
        if scores[i].total_cmp(&scores[best]) == Ordering::Greater {
            best = i;
        }
    }
    pool[best]
}
