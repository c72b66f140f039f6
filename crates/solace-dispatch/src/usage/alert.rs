//! Usage Alerting
//!
//! Threshold and anomaly detection against current usage. Evaluation is
//! soft: a failure here is logged and never blocks dispatch.

use super::aggregator::{AggregateWindow, UsageAggregator};
use super::forecast::{ForecastPeriod, Forecaster};
use crate::config::UsageConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

// ============================================================================
// Alert Types
// ============================================================================

/// What tripped the alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Month-to-date cost reached the configured threshold
    CostThreshold,
    /// Month-to-date units reached the configured threshold
    UsageThreshold,
    /// Today's cost exceeds a multiple of the daily forecast
    Anomaly,
}

/// How urgent the alert is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational
    Low,
    /// Threshold reached
    Medium,
    /// 120% of threshold
    High,
    /// 150% of threshold
    Critical,
}

/// One fired alert; transient, not persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageAlert {
    /// Alert id
    pub id: Uuid,
    /// Caller the alert concerns
    pub caller_id: String,
    /// What tripped it
    pub kind: AlertKind,
    /// Configured (or derived) threshold
    pub threshold: f64,
    /// Observed value that tripped it
    pub current_value: f64,
    /// Escalation level
    pub severity: AlertSeverity,
    /// Human-readable summary
    pub message: String,
}

/// Severity from how far past the threshold the value is
fn severity_for(ratio: f64) -> AlertSeverity {
    if ratio >= 1.5 {
        AlertSeverity::Critical
    } else if ratio >= 1.2 {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    }
}

// ============================================================================
// Alert Engine
// ============================================================================

/// Evaluates thresholds and anomalies for one caller at a time
pub struct AlertEngine {
    aggregator: Arc<UsageAggregator>,
    forecaster: Arc<Forecaster>,
    config: UsageConfig,
}

impl AlertEngine {
    /// Create an alert engine
    #[must_use]
    pub fn new(
        aggregator: Arc<UsageAggregator>,
        forecaster: Arc<Forecaster>,
        config: UsageConfig,
    ) -> Self {
        Self {
            aggregator,
            forecaster,
            config,
        }
    }

    /// Evaluate all alert conditions for a caller
    ///
    /// Returns whatever could be evaluated; store failures degrade to an
    /// empty (or partial) result with a warning.
    pub async fn evaluate(&self, caller_id: &str, now: DateTime<Utc>) -> Vec<UsageAlert> {
        let mut alerts = Vec::new();
        let thresholds = self.config.thresholds_for(caller_id);

        let month = match self
            .aggregator
            .aggregate(caller_id, AggregateWindow::MonthToDate, now)
            .await
        {
            Ok(aggregate) => aggregate,
            Err(e) => {
                warn!(caller = %caller_id, error = %e, "alert evaluation skipped");
                return alerts;
            }
        };

        let cost_threshold = thresholds.monthly_cost_threshold;
        if cost_threshold > 0.0 && month.total_cost >= cost_threshold {
            let ratio = month.total_cost / cost_threshold;
            alerts.push(UsageAlert {
                id: Uuid::new_v4(),
                caller_id: caller_id.to_string(),
                kind: AlertKind::CostThreshold,
                threshold: cost_threshold,
                current_value: month.total_cost,
                severity: severity_for(ratio),
                message: format!(
                    "Monthly cost ${:.2} reached {:.0}% of the ${:.2} threshold",
                    month.total_cost,
                    ratio * 100.0,
                    cost_threshold
                ),
            });
        }

        let usage_threshold = thresholds.monthly_usage_threshold;
        let month_units = month.total_units as f64;
        if usage_threshold > 0.0 && month_units >= usage_threshold {
            let ratio = month_units / usage_threshold;
            alerts.push(UsageAlert {
                id: Uuid::new_v4(),
                caller_id: caller_id.to_string(),
                kind: AlertKind::UsageThreshold,
                threshold: usage_threshold,
                current_value: month_units,
                severity: severity_for(ratio),
                message: format!(
                    "Monthly usage of {} units reached {:.0}% of the {} unit threshold",
                    month.total_units, ratio * 100.0, usage_threshold
                ),
            });
        }

        // Anomaly detection is independent of configured thresholds.
        if let Some(alert) = self.detect_anomaly(caller_id, now).await {
            alerts.push(alert);
        }

        alerts
    }

    async fn detect_anomaly(&self, caller_id: &str, now: DateTime<Utc>) -> Option<UsageAlert> {
        let today = match self
            .aggregator
            .aggregate(caller_id, AggregateWindow::Today, now)
            .await
        {
            Ok(aggregate) => aggregate,
            Err(e) => {
                warn!(caller = %caller_id, error = %e, "anomaly evaluation skipped");
                return None;
            }
        };

        let forecast = self
            .forecaster
            .cost_forecast(caller_id, ForecastPeriod::Daily, now)
            .await;
        if forecast.predicted_cost <= 0.0 {
            return None;
        }

        let ceiling = self.config.anomaly_multiplier * forecast.predicted_cost;
        if today.total_cost <= ceiling {
            return None;
        }

        Some(UsageAlert {
            id: Uuid::new_v4(),
            caller_id: caller_id.to_string(),
            kind: AlertKind::Anomaly,
            threshold: ceiling,
            current_value: today.total_cost,
            severity: AlertSeverity::High,
            message: format!(
                "Today's cost ${:.2} exceeds {:.1}x the daily forecast of ${:.2}",
                today.total_cost, self.config.anomaly_multiplier, forecast.predicted_cost
            ),
        })
    }
}
