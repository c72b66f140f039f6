//! Solace Dispatch - policy-driven backend dispatch and cost governance
//!
//! This crate sits between the Solace conversational layer and several
//! interchangeable generative backends. For every inbound turn it:
//! - Registry: keeps an atomically-swapped catalogue of backends with
//!   capability, cost, latency and quality attributes
//! - Policy: picks one backend per request from urgency, task type,
//!   complexity, subscription tier and remaining budget; crisis turns always
//!   get top quality regardless of cost
//! - Dispatcher: executes the call with a bounded wait, retries once on a
//!   different backend, and substitutes a safe degraded reply when both
//!   attempts fail
//! - Usage: appends one ledger record per real call attempt, and derives
//!   aggregates, forecasts, alerts and advisory recommendations from it
//!
//! The provider wire protocol and all persistence beyond the
//! [`usage::UsageStore`] seam live upstream; the engine is invoked as a
//! library through [`engine::DispatchEngine::select_and_dispatch`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod policy;
pub mod registry;
pub mod request;
pub mod usage;

pub use config::{
    CallerThresholds, DispatchConfig, EngineConfig, RecommendationConfig, ScoreWeights,
    SelectionConfig, UsageConfig,
};
pub use dispatch::{BackendClient, ClientResponse, DispatchResult, Dispatcher, MockBackendClient};
pub use engine::DispatchEngine;
pub use error::{Error, Result};
pub use policy::{BudgetConstraint, CallerUsageState, Selection, SelectionEngine, SelectionRule};
pub use registry::{
    BackendCatalog, BackendDescriptor, ModelRegistry, RegistrySnapshot, StaticCatalog,
};
pub use request::{Complexity, RequestDescriptor, SubscriptionTier, TaskType, Urgency};
pub use usage::{
    AggregateWindow, AlertEngine, AlertKind, AlertSeverity, BackendUsage, CostForecast,
    ForecastPeriod, Forecaster, LedgerTotals, MemoryLedger, OptimizationRecommendation,
    RecommendationEngine, RecommendationKind, UsageAggregate, UsageAggregator, UsageAlert,
    UsageRecord, UsageStore,
};
