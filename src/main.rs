//! Beacon Relay Server
//!
//! Run with: cargo run
//!
//! # Configuration
//!
//! Loaded from `config.toml` (current directory, `/etc/beacon/`, or the user
//! config directory), with environment variable overrides:
//! - `BEACON_HOST`: Host to bind to (default: 0.0.0.0)
//! - `BEACON_PORT`: Port to listen on (default: 8090)
//! - `BEACON_QUEUE_CAPACITY`: Per-user notification queue size (default: 64)
//! - `BEACON_LOG_LEVEL`: Log level (default: info)
//! - `BEACON_LOG_FORMAT`: pretty or json (default: pretty)
//! - `RUST_LOG`: Overrides the log filter entirely when set

use beacon::api::{serve, ApiConfig, AppState};
use beacon::config::Config;
use beacon::notify::HubConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default();

    init_tracing(&config);

    tracing::info!("Starting Beacon relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Notification queue capacity: {}",
        config.notifications.queue_capacity
    );

    let api_config = ApiConfig::new(config.api.host.clone(), config.api.port);
    let hub_config = HubConfig {
        queue_capacity: config.notifications.queue_capacity,
    };

    let state = AppState::with_hub_config(api_config.clone(), hub_config);

    serve(state, &api_config).await?;

    tracing::info!("Beacon relay stopped");
    Ok(())
}

/// Initialize tracing from the logging config
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("beacon={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
