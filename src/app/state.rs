use std::sync::Arc;
use std::time::Duration;

use crate::app::auth::TokenRegistry;
use crate::app::fetch::{Fetch, UreqFetcher};
use crate::app::store::DataStore;
use crate::config::Config;
use crate::server::dispatcher::Gate;
use crate::server::handshake::ContinueHandshake;

/// Artificial delays used to observe timeouts and overlapping requests.
#[derive(Debug, Clone, Copy)]
pub struct Delays {
    pub long_operation: Duration,
    pub list: Duration,
}

/// Everything the demo routes share, owned by one server instance.
pub struct AppState {
    pub auth: TokenRegistry,
    pub store: DataStore,
    pub fetcher: Arc<dyn Fetch>,
    pub handshake: ContinueHandshake,
    pub delays: Delays,
    service_available: Gate,
    external_available: Gate,
    long_timeout: Gate,
    available_url: String,
    unavailable_url: String,
}

impl AppState {
    pub fn from_config(cfg: &Config) -> Self {
        let fetcher = Arc::new(UreqFetcher::new(Duration::from_millis(cfg.external.timeout_ms)));
        Self::with_fetcher(cfg, fetcher)
    }

    pub fn with_fetcher(cfg: &Config, fetcher: Arc<dyn Fetch>) -> Self {
        let sim = &cfg.simulation;
        Self {
            auth: TokenRegistry::new(),
            store: DataStore::seeded(),
            fetcher,
            handshake: ContinueHandshake::from_config(&cfg.handshake, cfg.dispatch.max_body_bytes),
            delays: Delays {
                long_operation: Duration::from_millis(sim.long_operation_ms),
                list: Duration::from_millis(sim.list_delay_ms),
            },
            service_available: Gate::new(sim.service_available),
            external_available: Gate::new(sim.external_service_available),
            long_timeout: Gate::new(sim.long_timeout),
            available_url: cfg.external.available_url.clone(),
            unavailable_url: cfg.external.unavailable_url.clone(),
        }
    }

    /// The gate the dispatcher consults before running any handler.
    pub fn service_gate(&self) -> Gate {
        self.service_available.clone()
    }

    pub fn set_service_available(&self, available: bool) {
        self.service_available.set(available);
    }

    pub fn set_external_service_available(&self, available: bool) {
        self.external_available.set(available);
    }

    pub fn set_long_timeout(&self, enabled: bool) {
        self.long_timeout.set(enabled);
    }

    /// The upstream `/external` talks to, depending on the external gate.
    pub fn external_url(&self) -> &str {
        if self.external_available.is_open() {
            &self.available_url
        } else {
            &self.unavailable_url
        }
    }

    /// Sleeps for the long-operation delay when that simulation is on.
    pub fn simulate_long_operation(&self) {
        if self.long_timeout.is_open() {
            tracing::debug!(
                delay_ms = self.delays.long_operation.as_millis() as u64,
                "Simulating long operation"
            );
            std::thread::sleep(self.delays.long_operation);
        }
    }
}
