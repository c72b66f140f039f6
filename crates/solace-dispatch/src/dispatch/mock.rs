//! Mock backend client for testing
//!
//! Returns queued outcomes in order, or a default response when the queue
//! is empty. An outcome can carry a delay to exercise timeout and
//! cancellation paths.

use super::provider::{BackendClient, ClientResponse};
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct MockOutcome {
    result: Result<ClientResponse>,
    delay: Option<Duration>,
}

/// A mock backend client with a queue of scripted outcomes
pub struct MockBackendClient {
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockBackendClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackendClient {
    /// Create a mock with an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response
    pub fn push_ok(&self, content: &str, input_units: u64, output_units: u64) {
        self.push(
            Ok(ClientResponse {
                content: content.to_string(),
                input_units,
                output_units,
            }),
            None,
        );
    }

    /// Queue a failure
    pub fn push_err(&self, error: crate::error::Error) {
        self.push(Err(error), None);
    }

    /// Queue a successful response that arrives after `delay`
    pub fn push_ok_after(
        &self,
        content: &str,
        input_units: u64,
        output_units: u64,
        delay: Duration,
    ) {
        self.push(
            Ok(ClientResponse {
                content: content.to_string(),
                input_units,
                output_units,
            }),
            Some(delay),
        );
    }

    /// Backend ids called so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, result: Result<ClientResponse>, delay: Option<Duration>) {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(MockOutcome { result, delay });
    }
}

#[async_trait::async_trait]
impl BackendClient for MockBackendClient {
    async fn call(&self, backend_id: &str, _payload: &str) -> Result<ClientResponse> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(backend_id.to_string());

        let outcome = self
            .outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match outcome {
            Some(outcome) => {
                if let Some(delay) = outcome.delay {
                    tokio::time::sleep(delay).await;
                }
                outcome.result
            }
            // Default behavior if queue empty
            None => Ok(ClientResponse {
                content: "mock response".to_string(),
                input_units: 10,
                output_units: 20,
            }),
        }
    }
}
