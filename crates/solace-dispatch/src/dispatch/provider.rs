//! Backend provider seam
//!
//! The actual wire protocol lives upstream; the engine only depends on the
//! unit-count return contract.

use crate::error::Result;

/// What a backend call returns
#[derive(Debug, Clone)]
pub struct ClientResponse {
    /// Generated content
    pub content: String,
    /// Input units the provider billed
    pub input_units: u64,
    /// Output units the provider billed
    pub output_units: u64,
}

/// Outbound collaborator executing real model calls
#[async_trait::async_trait]
pub trait BackendClient: Send + Sync {
    /// Execute one call against the given backend
    async fn call(&self, backend_id: &str, payload: &str) -> Result<ClientResponse>;
}
