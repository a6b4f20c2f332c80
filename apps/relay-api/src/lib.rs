pub mod auth;
pub mod config;
pub mod relay;
pub mod routes;

use std::sync::Arc;

use config::Config;
use relay::service::RelayService;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Arc<RelayService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            relay: Arc::new(RelayService::new()),
        }
    }
}
