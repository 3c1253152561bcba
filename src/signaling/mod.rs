//! Signaling Relay Core
//!
//! Brokers the handshake metadata peers need to establish a direct media
//! connection. The relay holds no media and stores nothing durably.
//!
//! ## Architecture
//!
//! - **ConnectionRegistry**: live connections keyed by connection id, with
//!   per-target isolated delivery
//! - **SignalingRouter**: table-driven policy mapping inbound message types
//!   to derived envelopes and routes
//! - **Lifecycle**: WebSocket upgrade and the register/teardown protocol
//! - **Envelope**: the `{"type": ..., "data": ...}` wire unit
//!
//! ## Wire protocol
//!
//! Clients connect to `/api/v1/ws` and exchange JSON envelopes:
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8090/api/v1/ws?user_id=u1');
//! ws.send(JSON.stringify({type: 'offer', data: sdpOffer}));
//! // Every other connected peer receives:
//! // {"type": "offerResponse", "data": <sdpOffer unchanged>}
//! ```
//!
//! Recognized inbound types are `offer`, `answer`, and `iceCandidate`; any
//! other type (or an undecodable frame) earns the sender an `error` envelope
//! and leaves the connection open.

mod envelope;
mod lifecycle;
mod registry;
mod router;

pub use envelope::{Envelope, EnvelopeError, MessageType, ResponseType};
pub use lifecycle::websocket_handler;
pub use registry::{ConnectionId, ConnectionRegistry, DeliveryReport, RegistryError};
pub use router::{
    DispatchSummary, Outcome, PolicyEntry, Route, SignalingRouter, MALFORMED_DIAGNOSTIC,
    POLICY, UNKNOWN_TYPE_DIAGNOSTIC,
};
