//! Dispatcher
//!
//! Executes the selected backend call with a bounded wait, retries once on a
//! different backend on failure, and writes exactly one [`UsageRecord`] per
//! real attempt so partial failures stay auditable. The retry-once policy is
//! an explicit state machine, not nested error handling:
//!
//! ```text
//! Dispatching → Succeeded
//!             → RetryDispatching → Succeeded
//!                                → Failed (degraded response)
//! ```
//!
//! # Module Structure
//!
//! - `provider`: `BackendClient` trait
//! - `mock`: scripted mock client for tests

mod mock;
mod provider;

#[cfg(test)]
mod tests;

pub use mock::MockBackendClient;
pub use provider::{BackendClient, ClientResponse};

use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::policy::{Selection, SelectionRule};
use crate::request::RequestDescriptor;
use crate::usage::{UsageRecord, UsageStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

// ============================================================================
// Dispatch Result
// ============================================================================

/// Outcome surfaced to the conversational layer
#[derive(Debug, Clone)]
pub struct DispatchResult {
    /// Backend that produced the content; `None` for a degraded response
    pub backend_id: Option<String>,
    /// Generated (or canned degraded) content
    pub content: String,
    /// Latency of the successful attempt (ms); 0 when degraded
    pub latency_ms: u64,
    /// Whether a backend actually served the request
    pub success: bool,
    /// Whether the canned degraded reply was substituted
    pub degraded: bool,
    /// Rule that selected the serving backend
    pub rule: Option<SelectionRule>,
    /// Real backend call attempts made
    pub attempts: u32,
}

/// Retry-once state machine
enum DispatchState {
    Dispatching(Selection),
    RetryDispatching(Selection),
    Succeeded {
        selection: Selection,
        response: ClientResponse,
        latency_ms: u64,
    },
    Failed,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Executes selected calls and writes the ledger
pub struct Dispatcher {
    client: Arc<dyn BackendClient>,
    ledger: Arc<dyn UsageStore>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher
    #[must_use]
    pub fn new(
        client: Arc<dyn BackendClient>,
        ledger: Arc<dyn UsageStore>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            client,
            ledger,
            config,
        }
    }

    /// Execute the primary selection, falling back once on failure
    ///
    /// `fallback` is the re-selection excluding the primary backend, `None`
    /// when no other backend is eligible. Cancellation aborts immediately
    /// (no fallback) after recording the attempt.
    #[instrument(skip_all, fields(caller = %request.caller_id, backend = %primary.backend.id))]
    pub async fn dispatch(
        &self,
        request: &RequestDescriptor,
        primary: Selection,
        fallback: Option<Selection>,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<DispatchResult> {
        let mut fallback = fallback;
        let mut attempts: u32 = 0;
        let mut state = DispatchState::Dispatching(primary);

        let result = loop {
            state = match state {
                DispatchState::Dispatching(selection) => {
                    attempts += 1;
                    match self.attempt(request, &selection, payload, cancel).await {
                        Ok((response, latency_ms)) => DispatchState::Succeeded {
                            selection,
                            response,
                            latency_ms,
                        },
                        Err(Error::Cancelled) => return Err(Error::Cancelled),
                        Err(e) => {
                            warn!(backend = %selection.backend.id, error = %e, "primary attempt failed");
                            match fallback.take() {
                                Some(next) => DispatchState::RetryDispatching(next),
                                None => DispatchState::Failed,
                            }
                        }
                    }
                }
                DispatchState::RetryDispatching(selection) => {
                    attempts += 1;
                    match self.attempt(request, &selection, payload, cancel).await {
                        Ok((response, latency_ms)) => DispatchState::Succeeded {
                            selection,
                            response,
                            latency_ms,
                        },
                        Err(Error::Cancelled) => return Err(Error::Cancelled),
                        Err(e) => {
                            warn!(backend = %selection.backend.id, error = %e, "fallback attempt failed");
                            DispatchState::Failed
                        }
                    }
                }
                DispatchState::Succeeded {
                    selection,
                    response,
                    latency_ms,
                } => {
                    break DispatchResult {
                        backend_id: Some(selection.backend.id.clone()),
                        content: response.content,
                        latency_ms,
                        success: true,
                        degraded: false,
                        rule: Some(selection.rule),
                        attempts,
                    }
                }
                DispatchState::Failed => {
                    break DispatchResult {
                        backend_id: None,
                        content: self.config.degraded_message.clone(),
                        latency_ms: 0,
                        success: false,
                        degraded: true,
                        rule: None,
                        attempts,
                    }
                }
            };
        };

        Ok(result)
    }

    /// One real backend call: bounded wait, cancellation, one ledger record
    async fn attempt(
        &self,
        request: &RequestDescriptor,
        selection: &Selection,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<(ClientResponse, u64)> {
        let backend = &selection.backend;
        let timeout = Duration::from_millis(self.config.call_timeout_ms);
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let latency_ms = started.elapsed().as_millis() as u64;
                // the provider seam reports no partial usage on abandon
                let record =
                    UsageRecord::from_attempt(request, backend, 0, 0, latency_ms, false)
                        .with_metadata("cancelled", "true");
                self.append(record).await;
                return Err(Error::Cancelled);
            }
            outcome = tokio::time::timeout(timeout, self.client.call(&backend.id, payload)) => outcome,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Err(_elapsed) => {
                let record = UsageRecord::from_attempt(request, backend, 0, 0, latency_ms, false)
                    .with_metadata("timeout", "true");
                self.append(record).await;
                Err(Error::Timeout(
                    backend.id.clone(),
                    self.config.call_timeout_ms,
                ))
            }
            Ok(Err(e)) => {
                let record = UsageRecord::from_attempt(request, backend, 0, 0, latency_ms, false);
                self.append(record).await;
                Err(Error::Backend {
                    backend_id: backend.id.clone(),
                    reason: e.to_string(),
                })
            }
            Ok(Ok(response)) => {
                let record = UsageRecord::from_attempt(
                    request,
                    backend,
                    response.input_units,
                    response.output_units,
                    latency_ms,
                    true,
                );
                self.append(record).await;
                Ok((response, latency_ms))
            }
        }
    }

    async fn append(&self, record: UsageRecord) {
        if let Err(e) = self.ledger.append(record).await {
            warn!(error = %e, "failed to append usage record");
        }
    }
}
