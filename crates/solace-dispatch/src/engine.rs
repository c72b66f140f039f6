//! Dispatch engine facade
//!
//! Wires registry → policy → dispatcher → ledger behind the single entry
//! point the conversational layer calls: [`DispatchEngine::select_and_dispatch`].
//! Alerting runs on a spawned task after each dispatch so it can never block
//! or fail a turn; forecasts and recommendations are pull-based reads.

use crate::config::EngineConfig;
use crate::dispatch::{BackendClient, DispatchResult, Dispatcher};
use crate::error::Result;
use crate::policy::{CallerUsageState, SelectionEngine};
use crate::registry::ModelRegistry;
use crate::request::{RequestDescriptor, SubscriptionTier};
use crate::usage::{
    format_usage_report, AggregateWindow, AlertEngine, CostForecast, ForecastPeriod, Forecaster,
    OptimizationRecommendation, RecommendationEngine, UsageAggregator, UsageAlert, UsageStore,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Policy-driven dispatch and cost governance engine
///
/// One instance serves many concurrent callers; all state lives behind
/// `Arc`s, and nothing here is a process-wide singleton.
pub struct DispatchEngine {
    config: EngineConfig,
    registry: Arc<ModelRegistry>,
    selection: SelectionEngine,
    dispatcher: Dispatcher,
    aggregator: Arc<UsageAggregator>,
    forecaster: Arc<Forecaster>,
    alerts: Arc<AlertEngine>,
    recommender: RecommendationEngine,
}

impl DispatchEngine {
    /// Build an engine; the configuration is validated before anything runs
    pub fn new(
        config: EngineConfig,
        registry: Arc<ModelRegistry>,
        client: Arc<dyn BackendClient>,
        store: Arc<dyn UsageStore>,
    ) -> Result<Self> {
        config.validate()?;

        let aggregator = Arc::new(UsageAggregator::new(
            Arc::clone(&store),
            Duration::from_secs(config.usage.aggregate_cache_ttl_secs),
        ));
        let forecaster = Arc::new(Forecaster::new(Arc::clone(&store)));
        let alerts = Arc::new(AlertEngine::new(
            Arc::clone(&aggregator),
            Arc::clone(&forecaster),
            config.usage.clone(),
        ));
        let recommender = RecommendationEngine::new(
            Arc::clone(&aggregator),
            Arc::clone(&registry),
            config.recommendation.clone(),
        );
        let dispatcher = Dispatcher::new(client, store, config.dispatch.clone());
        let selection = SelectionEngine::new(config.selection.clone());

        Ok(Self {
            config,
            registry,
            selection,
            dispatcher,
            aggregator,
            forecaster,
            alerts,
            recommender,
        })
    }

    /// Serve one conversational turn: select a backend, execute with
    /// fallback, record usage, then evaluate alerts off the request path
    #[instrument(skip_all, fields(caller = %request.caller_id, task = %request.task_type))]
    pub async fn select_and_dispatch(
        &self,
        request: &RequestDescriptor,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<DispatchResult> {
        let candidates = self.registry.list_candidates(request.task_type).await?;
        let usage = self.caller_usage(&request.caller_id).await;
        let thresholds = self.config.usage.thresholds_for(&request.caller_id);

        let primary = self
            .selection
            .select(request, &candidates, &usage, thresholds)?;
        // the fallback is the re-selection without the primary backend; with
        // a single eligible backend there is none
        let fallback = self
            .selection
            .select_excluding(
                request,
                &candidates,
                &usage,
                thresholds,
                Some(&primary.backend.id),
            )
            .ok();

        let result = self
            .dispatcher
            .dispatch(request, primary, fallback, payload, cancel)
            .await?;

        let alerts = Arc::clone(&self.alerts);
        let caller_id = request.caller_id.clone();
        tokio::spawn(async move {
            for alert in alerts.evaluate(&caller_id, Utc::now()).await {
                info!(
                    caller = %alert.caller_id,
                    kind = ?alert.kind,
                    severity = ?alert.severity,
                    message = %alert.message,
                    "usage alert"
                );
            }
        });

        Ok(result)
    }

    /// Month-to-date usage state; a store failure degrades to the zero
    /// state rather than failing the turn
    async fn caller_usage(&self, caller_id: &str) -> CallerUsageState {
        match self
            .aggregator
            .aggregate(caller_id, AggregateWindow::MonthToDate, Utc::now())
            .await
        {
            Ok(aggregate) => CallerUsageState::from_aggregate(&aggregate),
            Err(e) => {
                warn!(caller = %caller_id, error = %e, "usage state unavailable, proceeding unconstrained");
                CallerUsageState::default()
            }
        }
    }

    /// Cost forecast for a caller
    pub async fn cost_forecast(&self, caller_id: &str, period: ForecastPeriod) -> CostForecast {
        self.forecaster
            .cost_forecast(caller_id, period, Utc::now())
            .await
    }

    /// Evaluate alert conditions for a caller right now
    pub async fn evaluate_alerts(&self, caller_id: &str) -> Vec<UsageAlert> {
        self.alerts.evaluate(caller_id, Utc::now()).await
    }

    /// Advisory recommendations for a caller
    pub async fn recommendations(
        &self,
        caller_id: &str,
        tier: SubscriptionTier,
    ) -> Vec<OptimizationRecommendation> {
        self.recommender
            .recommendations(caller_id, tier, Utc::now())
            .await
    }

    /// Month-to-date usage report as text
    pub async fn usage_report(&self, caller_id: &str, tier: SubscriptionTier) -> Result<String> {
        let now = Utc::now();
        let aggregate = self
            .aggregator
            .aggregate(caller_id, AggregateWindow::MonthToDate, now)
            .await?;
        let forecast = self
            .forecaster
            .cost_forecast(caller_id, ForecastPeriod::Monthly, now)
            .await;
        let recommendations = self
            .recommender
            .recommendations(caller_id, tier, now)
            .await;
        Ok(format_usage_report(
            &aggregate,
            Some(&forecast),
            &recommendations,
        ))
    }

    /// The backend registry, for refresher wiring and introspection
    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }
}
