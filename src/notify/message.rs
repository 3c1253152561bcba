//! Notification Message Types

use serde::{Deserialize, Serialize};

/// A push notification delivered on a user's subscription stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Message identity
    pub id: String,
    /// Free-text body
    pub message: String,
    /// Severity/level tag
    pub level: String,
}

impl Notification {
    pub fn new(
        id: impl Into<String>,
        message: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            level: level.into(),
        }
    }
}

/// Events carried on a subscription stream
///
/// `Connected` is the synthetic acknowledgement emitted when a freshly
/// subscribed client confirms its stream is up; everything else is a
/// published notification.
#[derive(Debug, Clone)]
pub enum HubEvent {
    Message(Notification),
    Connected,
}
