//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::notify::{HubConfig, NotificationHub};
use crate::signaling::{ConnectionRegistry, SignalingRouter};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Live signaling connections
    pub registry: Arc<ConnectionRegistry>,
    /// Policy-driven signaling fan-out
    pub router: Arc<SignalingRouter>,
    /// Per-user notification hub
    pub hub: Arc<NotificationHub>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with default hub configuration
    pub fn new(config: ApiConfig) -> Self {
        Self::with_hub_config(config, HubConfig::default())
    }

    /// Create AppState with custom notification queue sizing
    pub fn with_hub_config(config: ApiConfig, hub_config: HubConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(SignalingRouter::new(Arc::clone(&registry)));

        Self {
            registry,
            router,
            hub: Arc::new(NotificationHub::new(hub_config)),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
