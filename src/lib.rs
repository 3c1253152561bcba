//! # Beacon
//!
//! A signaling relay for peer-to-peer media sessions, plus a per-user push
//! notification channel. Beacon brokers the handshake metadata (SDP offers
//! and answers, ICE candidates) that peers need to establish a direct
//! connection; it never touches the media itself and holds no durable state.
//!
//! ## Modules
//!
//! - [`signaling`]: connection registry, policy-driven fan-out, and the
//!   WebSocket connection lifecycle
//! - [`notify`]: per-user bounded notification queues with SSE delivery
//! - [`api`]: HTTP server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beacon::api::{serve, ApiConfig, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::default();
//!     let state = AppState::new(config.clone());
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod notify;
pub mod signaling;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use signaling::{
    ConnectionId, ConnectionRegistry, DeliveryReport, Envelope, EnvelopeError, MessageType,
    RegistryError, ResponseType, SignalingRouter, websocket_handler,
};

pub use notify::{HubConfig, HubError, HubEvent, Notification, NotificationHub};

pub use config::{Config, ConfigError, LoggingConfig, NotificationsConfig};
