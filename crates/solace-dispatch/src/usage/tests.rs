//! Tests for the usage module

use super::*;
use crate::config::{RecommendationConfig, UsageConfig};
use crate::registry::{BackendDescriptor, ModelRegistry, StaticCatalog};
use crate::request::{SubscriptionTier, TaskType};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn backend(id: &str, input_cost: f64, output_cost: f64) -> BackendDescriptor {
    BackendDescriptor {
        id: id.to_string(),
        display_name: id.to_uppercase(),
        provider_family: "testfam".to_string(),
        capabilities: [TaskType::Chat, TaskType::Analysis].into_iter().collect(),
        cost_per_input_unit: input_cost,
        cost_per_output_unit: output_cost,
        average_latency_ms: 800,
        quality_score: 0.8,
        available: true,
    }
}

fn record(
    caller: &str,
    backend_id: &str,
    cost: f64,
    units: u64,
    timestamp: chrono::DateTime<Utc>,
) -> UsageRecord {
    UsageRecord {
        id: Uuid::new_v4(),
        caller_id: caller.to_string(),
        session_id: None,
        backend_id: backend_id.to_string(),
        provider_family: "testfam".to_string(),
        task_type: TaskType::Chat,
        input_units: units / 2,
        output_units: units - units / 2,
        total_units: units,
        unit_cost: if units > 0 { cost / units as f64 } else { 0.0 },
        total_cost: cost,
        response_time_ms: 750,
        success: true,
        subscription_tier: SubscriptionTier::Pro,
        timestamp,
        metadata: BTreeMap::new(),
    }
}

fn at(year: i32, month: u32, day: u32, hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

// ============================================================================
// Costing
// ============================================================================

#[test]
fn cost_is_units_times_unit_price() {
    let b = backend("a", 0.00003, 0.0);
    let cost = cost_of(&b, 1000, 0);
    assert!((cost - 0.03).abs() < 1e-12);
}

#[test]
fn cost_sums_input_and_output_sides() {
    let b = backend("a", 0.00003, 0.00006);
    let cost = cost_of(&b, 1000, 500);
    assert!((cost - 0.06).abs() < 1e-12);
}

// ============================================================================
// Ledger
// ============================================================================

#[tokio::test]
async fn ledger_query_filters_caller_and_range() {
    let ledger = MemoryLedger::new();
    let now = at(2026, 8, 7, 12);
    ledger
        .append(record("a", "m1", 1.0, 100, now - ChronoDuration::hours(2)))
        .await
        .unwrap();
    ledger
        .append(record("b", "m1", 1.0, 100, now - ChronoDuration::hours(2)))
        .await
        .unwrap();
    ledger
        .append(record("a", "m1", 1.0, 100, now - ChronoDuration::days(3)))
        .await
        .unwrap();

    let records = ledger
        .query("a", now - ChronoDuration::days(1), now)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].caller_id, "a");
}

#[tokio::test]
async fn ledger_query_orders_by_timestamp() {
    let ledger = MemoryLedger::new();
    let now = at(2026, 8, 7, 12);
    ledger
        .append(record("a", "m2", 2.0, 100, now - ChronoDuration::hours(1)))
        .await
        .unwrap();
    ledger
        .append(record("a", "m1", 1.0, 100, now - ChronoDuration::hours(5)))
        .await
        .unwrap();

    let records = ledger
        .query("a", now - ChronoDuration::days(1), now)
        .await
        .unwrap();
    assert_eq!(records[0].backend_id, "m1");
    assert_eq!(records[1].backend_id, "m2");
}

#[tokio::test]
async fn try_totals_snapshots_without_blocking() {
    let ledger = MemoryLedger::new();
    let now = at(2026, 8, 7, 12);
    ledger
        .append(record("a", "m1", 1.5, 300, now))
        .await
        .unwrap();

    let totals = ledger.try_totals().unwrap();
    assert_eq!(totals.records, 1);
    assert_eq!(totals.total_units, 300);
    assert!((totals.total_cost - 1.5).abs() < 1e-12);
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn aggregate_sums_window_records() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    ledger
        .append(record("a", "m1", 1.0, 100, at(2026, 8, 3, 9)))
        .await
        .unwrap();
    ledger
        .append(record("a", "m2", 2.5, 200, at(2026, 8, 15, 9)))
        .await
        .unwrap();
    // outside the month-to-date window
    ledger
        .append(record("a", "m1", 9.0, 900, at(2026, 7, 28, 9)))
        .await
        .unwrap();

    let aggregator = UsageAggregator::new(ledger, Duration::ZERO);
    let aggregate = aggregator
        .aggregate("a", AggregateWindow::MonthToDate, now)
        .await
        .unwrap();

    assert_eq!(aggregate.total_requests, 2);
    assert_eq!(aggregate.total_units, 300);
    assert!((aggregate.total_cost - 3.5).abs() < 1e-12);
    assert_eq!(aggregate.per_backend.len(), 2);
    assert_eq!(aggregate.per_backend["m2"].requests, 1);
}

#[tokio::test]
async fn recomputed_aggregate_is_byte_identical() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    for day in 1..=10 {
        ledger
            .append(record("a", "m1", 0.1 * day as f64, 50, at(2026, 8, day, 10)))
            .await
            .unwrap();
        ledger
            .append(record("a", "m2", 0.07 * day as f64, 30, at(2026, 8, day, 11)))
            .await
            .unwrap();
    }

    let aggregator = UsageAggregator::new(ledger, Duration::ZERO);
    let first = aggregator
        .aggregate("a", AggregateWindow::MonthToDate, now)
        .await
        .unwrap();
    let second = aggregator
        .aggregate("a", AggregateWindow::MonthToDate, now)
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn aggregate_cache_serves_within_ttl() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    ledger
        .append(record("a", "m1", 1.0, 100, at(2026, 8, 10, 9)))
        .await
        .unwrap();

    let aggregator = UsageAggregator::new(Arc::clone(&ledger) as Arc<dyn UsageStore>, Duration::from_secs(60));
    let first = aggregator
        .aggregate("a", AggregateWindow::MonthToDate, now)
        .await
        .unwrap();

    // a new append is invisible until the TTL lapses
    ledger
        .append(record("a", "m1", 5.0, 100, at(2026, 8, 11, 9)))
        .await
        .unwrap();
    let cached = aggregator
        .aggregate("a", AggregateWindow::MonthToDate, now)
        .await
        .unwrap();

    assert_eq!(first.total_requests, cached.total_requests);
    assert!((first.total_cost - cached.total_cost).abs() < 1e-12);
}

#[test]
fn empty_fold_has_zero_latency() {
    let now = at(2026, 8, 20, 12);
    let aggregate = fold_records("a", now - ChronoDuration::days(1), now, &[]);
    assert_eq!(aggregate.total_requests, 0);
    assert_eq!(aggregate.avg_response_time_ms, 0.0);
}

// ============================================================================
// Forecasting
// ============================================================================

#[test]
fn zero_history_yields_zero_forecast() {
    let forecast = project("a", ForecastPeriod::Daily, &[]);
    assert_eq!(forecast.predicted_cost, 0.0);
    assert_eq!(forecast.predicted_units, 0.0);
    assert_eq!(forecast.confidence, 0.0);
    assert!(forecast.per_backend.is_empty());
}

#[test]
fn forecast_scales_mean_daily_cost_to_horizon() {
    // $2/day over 4 distinct days
    let records: Vec<UsageRecord> = (1..=4)
        .map(|day| record("a", "m1", 2.0, 100, at(2026, 8, day, 10)))
        .collect();

    let forecast = project("a", ForecastPeriod::Weekly, &records);
    assert!((forecast.predicted_cost - 14.0).abs() < 1e-9);
    assert!((forecast.confidence - 4.0 / 28.0).abs() < 1e-9);
}

#[test]
fn forecast_confidence_grows_with_history_and_caps() {
    let mut last = 0.0;
    for days in 1..=10 {
        let records: Vec<UsageRecord> = (0..days)
            .map(|d| record("a", "m1", 1.0, 100, at(2026, 8, 1, 0) + ChronoDuration::days(d)))
            .collect();
        let confidence = project("a", ForecastPeriod::Daily, &records).confidence;
        assert!(confidence >= last, "confidence regressed at {days} days");
        last = confidence;
    }
    // 10 observed days over a 7-day lookback: capped
    assert_eq!(last, MAX_CONFIDENCE);
}

#[test]
fn forecast_breakdown_is_proportional_to_cost_share() {
    let records = vec![
        record("a", "m1", 3.0, 100, at(2026, 8, 1, 10)),
        record("a", "m2", 1.0, 100, at(2026, 8, 2, 10)),
    ];

    let forecast = project("a", ForecastPeriod::Daily, &records);
    let m1 = forecast.per_backend["m1"];
    let m2 = forecast.per_backend["m2"];
    assert!((m1 / m2 - 3.0).abs() < 1e-9);
    assert!((m1 + m2 - forecast.predicted_cost).abs() < 1e-9);
}

#[tokio::test]
async fn forecaster_with_empty_store_returns_zero_forecast() {
    let ledger = Arc::new(MemoryLedger::new());
    let forecaster = Forecaster::new(ledger);

    let forecast = forecaster
        .cost_forecast("a", ForecastPeriod::Monthly, Utc::now())
        .await;
    assert_eq!(forecast.predicted_cost, 0.0);
    assert_eq!(forecast.confidence, 0.0);
}

// ============================================================================
// Alerting
// ============================================================================

fn alert_engine(ledger: Arc<MemoryLedger>, config: UsageConfig) -> AlertEngine {
    let store: Arc<dyn UsageStore> = ledger;
    let aggregator = Arc::new(UsageAggregator::new(Arc::clone(&store), Duration::ZERO));
    let forecaster = Arc::new(Forecaster::new(store));
    AlertEngine::new(aggregator, forecaster, config)
}

#[tokio::test]
async fn no_alerts_under_thresholds() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    ledger
        .append(record("a", "m1", 1.0, 100, at(2026, 8, 10, 9)))
        .await
        .unwrap();

    let engine = alert_engine(ledger, UsageConfig::default());
    let alerts = engine.evaluate("a", now).await;
    assert!(alerts.is_empty());
}

#[tokio::test]
async fn cost_threshold_alert_escalates_with_overshoot() {
    let now = at(2026, 8, 20, 12);

    for (cost, expected) in [
        (100.0, AlertSeverity::Medium),
        (125.0, AlertSeverity::High),
        (160.0, AlertSeverity::Critical),
    ] {
        let ledger = Arc::new(MemoryLedger::new());
        ledger
            .append(record("a", "m1", cost, 100, at(2026, 8, 10, 9)))
            .await
            .unwrap();
        let engine = alert_engine(ledger, UsageConfig::default());

        let alerts = engine.evaluate("a", now).await;
        let alert = alerts
            .iter()
            .find(|a| a.kind == AlertKind::CostThreshold)
            .expect("cost threshold alert");
        assert_eq!(alert.severity, expected, "cost {cost}");
        assert_eq!(alert.threshold, 100.0);
    }
}

#[tokio::test]
async fn usage_threshold_alert_fires_on_units() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    ledger
        .append(record("a", "m1", 1.0, 2_500_000, at(2026, 8, 10, 9)))
        .await
        .unwrap();

    let engine = alert_engine(ledger, UsageConfig::default());
    let alerts = engine.evaluate("a", now).await;
    assert!(alerts.iter().any(|a| a.kind == AlertKind::UsageThreshold));
}

#[tokio::test]
async fn anomaly_fires_when_today_doubles_the_forecast() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 18);
    // steady $1/day history
    for day in 14..20 {
        ledger
            .append(record("a", "m1", 1.0, 100, at(2026, 8, day, 9)))
            .await
            .unwrap();
    }
    // $9 today, way past 2x the ~$2.1 daily mean
    ledger
        .append(record("a", "m1", 9.0, 900, at(2026, 8, 20, 10)))
        .await
        .unwrap();

    let engine = alert_engine(ledger, UsageConfig::default());
    let alerts = engine.evaluate("a", now).await;
    let anomaly = alerts
        .iter()
        .find(|a| a.kind == AlertKind::Anomaly)
        .expect("anomaly alert");
    assert_eq!(anomaly.severity, AlertSeverity::High);
    assert!(anomaly.current_value >= 9.0);
}

#[tokio::test]
async fn no_anomaly_without_history() {
    let ledger = Arc::new(MemoryLedger::new());
    let engine = alert_engine(ledger, UsageConfig::default());
    let alerts = engine.evaluate("a", at(2026, 8, 20, 12)).await;
    assert!(alerts.is_empty());
}

// ============================================================================
// Recommendations
// ============================================================================

async fn recommendation_engine(
    ledger: Arc<MemoryLedger>,
    backends: Vec<BackendDescriptor>,
) -> RecommendationEngine {
    let store: Arc<dyn UsageStore> = ledger;
    let aggregator = Arc::new(UsageAggregator::new(store, Duration::ZERO));
    let registry = Arc::new(
        ModelRegistry::new(Arc::new(StaticCatalog::new(backends)))
            .await
            .unwrap(),
    );
    RecommendationEngine::new(aggregator, registry, RecommendationConfig::default())
}

#[tokio::test]
async fn dominant_backend_with_cheaper_alternative_suggests_downgrade() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    for day in 1..=5 {
        ledger
            .append(record("a", "pricey", 10.0, 10_000, at(2026, 8, day, 9)))
            .await
            .unwrap();
    }
    ledger
        .append(record("a", "thrifty", 1.0, 1_000, at(2026, 8, 6, 9)))
        .await
        .unwrap();

    let engine = recommendation_engine(
        Arc::clone(&ledger),
        vec![
            backend("pricey", 0.0005, 0.0010),
            backend("thrifty", 0.00005, 0.0001),
        ],
    )
    .await;

    let recommendations = engine
        .recommendations("a", SubscriptionTier::Premium, now)
        .await;
    let downgrade = recommendations
        .iter()
        .find(|r| r.kind == RecommendationKind::ModelDowngrade)
        .expect("model downgrade recommendation");
    assert!(downgrade.potential_savings > 0.0);
    assert!(downgrade.confidence > 0.8);
}

#[tokio::test]
async fn dominance_without_alternative_notes_the_pattern() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    ledger
        .append(record("a", "only", 50.0, 10_000, at(2026, 8, 5, 9)))
        .await
        .unwrap();

    let engine =
        recommendation_engine(Arc::clone(&ledger), vec![backend("only", 0.0005, 0.0010)]).await;

    let recommendations = engine
        .recommendations("a", SubscriptionTier::Premium, now)
        .await;
    assert!(recommendations
        .iter()
        .any(|r| r.kind == RecommendationKind::UsagePattern));
}

#[tokio::test]
async fn paid_tier_with_low_spend_suggests_plan_change() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    ledger
        .append(record("a", "m1", 0.5, 100, at(2026, 8, 5, 9)))
        .await
        .unwrap();

    let engine =
        recommendation_engine(Arc::clone(&ledger), vec![backend("m1", 0.0001, 0.0002)]).await;

    let recommendations = engine
        .recommendations("a", SubscriptionTier::Premium, now)
        .await;
    assert!(recommendations
        .iter()
        .any(|r| r.kind == RecommendationKind::PlanChange));
}

#[tokio::test]
async fn free_tier_high_volume_suggests_upgrade_with_zero_savings() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    for i in 0..600u32 {
        ledger
            .append(record(
                "a",
                "m1",
                0.001,
                10,
                at(2026, 8, 1, 0) + ChronoDuration::minutes(i as i64),
            ))
            .await
            .unwrap();
    }

    let engine =
        recommendation_engine(Arc::clone(&ledger), vec![backend("m1", 0.0001, 0.0002)]).await;

    let recommendations = engine.recommendations("a", SubscriptionTier::Free, now).await;
    let upgrade = recommendations
        .iter()
        .find(|r| r.kind == RecommendationKind::PlanChange)
        .expect("plan change recommendation");
    assert_eq!(upgrade.potential_savings, 0.0);
}

// ============================================================================
// Reporting
// ============================================================================

#[tokio::test]
async fn report_renders_summary_and_breakdown() {
    let ledger = Arc::new(MemoryLedger::new());
    let now = at(2026, 8, 20, 12);
    ledger
        .append(record("a", "m1", 2.0, 400, at(2026, 8, 10, 9)))
        .await
        .unwrap();

    let aggregator = UsageAggregator::new(Arc::clone(&ledger) as Arc<dyn UsageStore>, Duration::ZERO);
    let aggregate = aggregator
        .aggregate("a", AggregateWindow::MonthToDate, now)
        .await
        .unwrap();

    let report = format_usage_report(&aggregate, None, &[]);
    assert!(report.contains("Usage Report"));
    assert!(report.contains("m1"));
    assert!(report.contains("$2.0000"));
}
