use std::sync::Arc;

use crate::config::AppConfig;
use crate::middleware::TenantKey;
use crate::services::DocumentService;
use crate::store::DocumentStore;

/// Shared handler state. The store handle is constructed once at startup and
/// threaded through the router.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Service bound to one request's partition
    pub fn documents(&self, key: TenantKey) -> DocumentService {
        DocumentService::new(self.store.clone(), key)
    }
}
