//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};

/// Group-send request body: the list of target user ids
#[derive(Debug, Deserialize)]
pub struct SendGroupRequest {
    /// Users to notify; failures for individual ids do not affect the others
    pub to: Vec<String>,
}

/// Health status response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy"
    pub status: String,
    /// Live signaling connections
    pub connections: usize,
    /// Live notification subscriptions
    pub subscriptions: usize,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_group_request_deserialize() {
        let req: SendGroupRequest = serde_json::from_str(r#"{"to":["u1","u2"]}"#).unwrap();
        assert_eq!(req.to, vec!["u1", "u2"]);
    }
}
