//! Shared application state for the proxy server.

use crate::passthrough::Passthrough;
use oqbridge_backend::{ColdStore, HotStore};
use oqbridge_core::Config;
use oqbridge_query::Router;
use std::sync::Arc;

/// Collaborators injected into every request handler. Constructed once at
/// startup; nothing here holds per-request mutable state.
#[derive(Clone)]
pub struct AppState {
    /// Shared configuration.
    pub cfg: Arc<Config>,
    /// Hot-store client (search, auth, coordination).
    pub hot: Arc<dyn HotStore>,
    /// Cold-store client (search over archived indices).
    pub cold: Arc<dyn ColdStore>,
    /// Tier router derived from the retention policy.
    pub router: Arc<Router>,
    /// Reverse-proxy passthrough to the hot store.
    pub passthrough: Arc<Passthrough>,
}

impl AppState {
    /// Wires up the state from configuration and concrete backends.
    pub fn new(
        cfg: Arc<Config>,
        hot: Arc<dyn HotStore>,
        cold: Arc<dyn ColdStore>,
        passthrough: Arc<Passthrough>,
    ) -> Self {
        let router = Arc::new(Router::new(cfg.retention.hot_days));
        Self {
            cfg,
            hot,
            cold,
            router,
            passthrough,
        }
    }
}
