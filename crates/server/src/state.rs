use loyalty_core::{AccrualEngine, Authenticator, Config, OrderStore, SanitizedConfig};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    store: Arc<dyn OrderStore>,
    engine: Arc<AccrualEngine>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        store: Arc<dyn OrderStore>,
        engine: Arc<AccrualEngine>,
    ) -> Self {
        Self {
            config,
            authenticator,
            store,
            engine,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn store(&self) -> &dyn OrderStore {
        self.store.as_ref()
    }

    pub fn engine(&self) -> &AccrualEngine {
        &self.engine
    }
}
