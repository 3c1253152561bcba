//! Beacon HTTP API
//!
//! HTTP layer for the relay, built with Axum.
//!
//! # Endpoints
//!
//! ## Signaling
//! - `GET /api/v1/ws` - WebSocket signaling connection (optional `?user_id=`)
//!
//! ## Notifications
//! - `GET /api/v1/sse/:user_id` - Subscribe to the user's SSE stream
//! - `GET /api/v1/sse/:user_id/connect` - Confirm the stream is connected
//! - `GET /api/v1/send/:user_id` - Send a notification to one user
//! - `POST /api/v1/send` - Send a notification to a group of users
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
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

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::signaling::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Signaling transport
        .route("/ws", get(websocket_handler))
        // Notification routes
        .route("/sse/:user_id", get(routes::notify::sse_stream))
        .route("/sse/:user_id/connect", get(routes::notify::sse_confirm))
        .route("/send/:user_id", get(routes::notify::send_to_user))
        .route("/send", post(routes::notify::send_to_group));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()) // Configure properly in production
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Beacon relay listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Beacon relay shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{HubEvent, NotificationHub};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tokio_stream::StreamExt;
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<NotificationHub>) {
        let state = AppState::new(ApiConfig::default());
        let hub = Arc::clone(&state.hub);
        (build_router(state), hub)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _hub) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _hub) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("\"status\":\"healthy\""));
        assert!(body.contains("\"connections\":0"));
    }

    #[tokio::test]
    async fn test_send_to_offline_user_is_ok_but_false() {
        let (app, _hub) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/send/nobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "false");
    }

    #[tokio::test]
    async fn test_send_to_subscribed_user_reaches_stream() {
        let (app, hub) = create_test_app();
        let mut stream = hub.subscribe("u1").await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/send/u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "true");

        match stream.next().await.unwrap() {
            HubEvent::Message(n) => {
                assert_eq!(n.level, "1");
                assert!(!n.message.is_empty());
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_confirm_without_subscription_is_404() {
        let (app, _hub) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sse/u1/connect")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("NO_SUCH_SUBSCRIPTION"));
    }

    #[tokio::test]
    async fn test_confirm_with_subscription() {
        let (app, hub) = create_test_app();
        let mut stream = hub.subscribe("u1").await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sse/u1/connect")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(matches!(stream.next().await.unwrap(), HubEvent::Connected));
    }

    #[tokio::test]
    async fn test_group_send_skips_offline_users() {
        let (app, hub) = create_test_app();
        let mut a = hub.subscribe("a").await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/send")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"to":["a","offline"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(matches!(a.next().await.unwrap(), HubEvent::Message(_)));
    }

    #[tokio::test]
    async fn test_sse_stream_responds_with_event_stream() {
        let (app, hub) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sse/u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/event-stream"
        );
        assert!(hub.is_subscribed("u1").await);
    }
}
