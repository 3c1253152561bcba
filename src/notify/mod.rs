//! Per-User Push Notifications
//!
//! Out-of-band notification delivery, independent of the signaling relay.
//! HTTP-triggered publishes land on per-user bounded queues; each subscribed
//! user consumes its queue through a single SSE stream.
//!
//! - **NotificationHub**: queue lifecycle, publish, and the connected
//!   acknowledgement
//! - **Messages**: the notification value and stream event types

mod hub;
mod message;

pub use hub::{HubConfig, HubError, NotificationHub, SubscriberStream};
pub use message::{HubEvent, Notification};
