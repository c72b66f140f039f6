//! Model Registry
//!
//! Catalogue of the generative backends the engine can dispatch to, with
//! capability, cost, latency and quality attributes per backend.
//!
//! The registry is read-mostly: readers take an [`Arc`] snapshot and never
//! observe a half-updated catalogue; a single writer refreshes the snapshot
//! from a [`BackendCatalog`] on a timer, replacing the whole `Arc` in one
//! swap.

use crate::error::{Error, Result};
use crate::request::TaskType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};


// ============================================================================
// Backend Descriptor
// ============================================================================

/// One interchangeable generative backend
///
/// Immutable per snapshot. A backend with `available = false` is never
/// selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Stable identifier, unique within a snapshot
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Provider family (e.g. "anthropic", "openai")
    pub provider_family: String,
    /// Task types this backend can serve
    pub capabilities: BTreeSet<TaskType>,
    /// USD per input unit
    pub cost_per_input_unit: f64,
    /// USD per output unit
    pub cost_per_output_unit: f64,
    /// Observed average latency (ms)
    pub average_latency_ms: u64,
    /// Quality score in [0, 1]
    pub quality_score: f64,
    /// Whether the backend currently accepts traffic
    pub available: bool,
}

impl BackendDescriptor {
    /// Whether this backend can serve the given task type
    #[must_use]
    pub fn supports(&self, task_type: TaskType) -> bool {
        self.capabilities.contains(&task_type)
    }

    /// Combined input + output unit cost, used for relative cost ranking
    #[must_use]
    pub fn combined_unit_cost(&self) -> f64 {
        self.cost_per_input_unit + self.cost_per_output_unit
    }
}

// ============================================================================
// Registry Snapshot
// ============================================================================

/// Immutable view of the backend catalogue at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    backends: Vec<BackendDescriptor>,
    /// When this snapshot was taken
    pub refreshed_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    /// Build a snapshot; backends are kept sorted by id so every consumer
    /// sees the same deterministic order
    #[must_use]
    pub fn new(mut backends: Vec<BackendDescriptor>) -> Self {
        backends.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            backends,
            refreshed_at: Utc::now(),
        }
    }

    /// All backends, sorted by id
    #[must_use]
    pub fn backends(&self) -> &[BackendDescriptor] {
        &self.backends
    }

    /// Look up a backend by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// Available backends whose capabilities include `task_type`, sorted by
    /// id. An empty result is fatal and non-retryable for the request.
    pub fn list_candidates(&self, task_type: TaskType) -> Result<Vec<BackendDescriptor>> {
        let candidates: Vec<BackendDescriptor> = self
            .backends
            .iter()
            .filter(|b| b.available && b.supports(task_type))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Err(Error::NoCandidates(task_type));
        }
        Ok(candidates)
    }

    /// Number of backends in the snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the snapshot is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

// ============================================================================
// Catalog Seam
// ============================================================================

/// Source the registry refreshes from (key/relational store upstream)
#[async_trait::async_trait]
pub trait BackendCatalog: Send + Sync {
    /// Load the current backend fleet
    async fn load(&self) -> Result<Vec<BackendDescriptor>>;
}

/// Fixed in-memory catalog for static fleets and tests
pub struct StaticCatalog {
    backends: Vec<BackendDescriptor>,
}

impl StaticCatalog {
    /// Create a catalog over a fixed fleet
    #[must_use]
    pub fn new(backends: Vec<BackendDescriptor>) -> Self {
        Self { backends }
    }
}

#[async_trait::async_trait]
impl BackendCatalog for StaticCatalog {
    async fn load(&self) -> Result<Vec<BackendDescriptor>> {
        Ok(self.backends.clone())
    }
}

// ============================================================================
// Model Registry
// ============================================================================

/// Shared, atomically-swapped backend catalogue
pub struct ModelRegistry {
    catalog: Arc<dyn BackendCatalog>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl ModelRegistry {
    /// Create a registry with an initial load from the catalog
    pub async fn new(catalog: Arc<dyn BackendCatalog>) -> Result<Self> {
        let backends = catalog.load().await?;
        debug!(backends = backends.len(), "model registry loaded");
        Ok(Self {
            catalog,
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::new(backends))),
        })
    }

    /// Current snapshot; the returned `Arc` stays valid across refreshes
    pub async fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Reload the catalogue and swap the snapshot in one step
    pub async fn refresh(&self) -> Result<()> {
        let backends = self.catalog.load().await?;
        let next = Arc::new(RegistrySnapshot::new(backends));
        let count = next.len();
        *self.snapshot.write().await = next;
        debug!(backends = count, "model registry refreshed");
        Ok(())
    }

    /// Run `refresh` on a timer. A failed refresh keeps the previous
    /// snapshot and is retried on the next tick.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // first tick completes immediately; the initial load already ran
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = registry.refresh().await {
                    warn!(error = %e, "registry refresh failed, keeping previous snapshot");
                }
            }
        })
    }

    /// Candidates for a task type from the current snapshot
    pub async fn list_candidates(&self, task_type: TaskType) -> Result<Vec<BackendDescriptor>> {
        self.snapshot().await.list_candidates(task_type)
    }
}
