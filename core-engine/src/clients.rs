//! Per-tenant remote client construction.
//!
//! Each tenant carries its own credential and base, so the engine builds a
//! client per run rather than holding one globally. The factory seam keeps
//! the engine testable with mocked clients.

use core_store::Tenant;
use provider_airtable::{AirtableConnector, ReqwestHttpClient};
use remote_traits::{HttpClient, RemoteClient};
use std::sync::Arc;

/// Builds a remote client from a tenant's credentials.
pub trait RemoteClientFactory: Send + Sync {
    /// Construct a client scoped to this tenant's credential and base
    fn client_for(&self, tenant: &Tenant) -> Arc<dyn RemoteClient>;
}

/// Factory producing Airtable connectors over a shared HTTP client.
pub struct AirtableClientFactory {
    http_client: Arc<dyn HttpClient>,
}

impl AirtableClientFactory {
    /// Create a factory with a default reqwest-backed HTTP client
    pub fn new() -> Self {
        Self {
            http_client: Arc::new(ReqwestHttpClient::new()),
        }
    }

    /// Create a factory over an existing HTTP client
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }
}

impl Default for AirtableClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteClientFactory for AirtableClientFactory {
    fn client_for(&self, tenant: &Tenant) -> Arc<dyn RemoteClient> {
        Arc::new(AirtableConnector::new(
            self.http_client.clone(),
            tenant.api_token.clone(),
            tenant.base_id.clone(),
        ))
    }
}
