//! Signaling Router
//!
//! Maps an inbound (connection id, envelope) pair to a delivery action.
//! The policy table below is the single source of truth: adding a message
//! type means adding one table entry. The router never raises past its own
//! boundary - malformed frames, unknown types, and delivery failures all
//! resolve to a best-effort reply plus a completed dispatch.

use std::sync::Arc;
use tracing::{debug, warn};

use super::envelope::{Envelope, MessageType, ResponseType};
use super::registry::{ConnectionId, ConnectionRegistry, DeliveryReport};

/// Fixed diagnostic payload for the unknown-type fallback
pub const UNKNOWN_TYPE_DIAGNOSTIC: &str = "Unknown message type";

/// Fixed diagnostic payload for frames that fail to decode
///
/// The raw decode cause goes to the log, not the wire.
pub const MALFORMED_DIAGNOSTIC: &str = "Malformed message envelope";

/// Where a derived envelope goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Back to the sender only
    Echo,
    /// To every other live connection
    BroadcastOthers,
}

/// One policy table entry: derived type + route for an inbound message type
#[derive(Debug, Clone, Copy)]
pub struct PolicyEntry {
    pub inbound: MessageType,
    pub response: ResponseType,
    pub route: Route,
}

/// The forwarding policy, one entry per recognized inbound type
pub const POLICY: &[PolicyEntry] = &[
    PolicyEntry {
        inbound: MessageType::Offer,
        response: ResponseType::OfferResponse,
        route: Route::BroadcastOthers,
    },
    PolicyEntry {
        inbound: MessageType::Answer,
        response: ResponseType::AnswerResponse,
        route: Route::BroadcastOthers,
    },
    PolicyEntry {
        inbound: MessageType::IceCandidate,
        response: ResponseType::IceCandidateResponse,
        route: Route::BroadcastOthers,
    },
];

fn policy_for_wire(kind: &str) -> Option<&'static PolicyEntry> {
    POLICY.iter().find(|entry| entry.inbound.as_wire() == kind)
}

/// How one dispatch resolved, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Recognized type, derived envelope forwarded per its route
    Forwarded(MessageType),
    /// Unrecognized type, error envelope echoed to the sender
    UnknownType,
    /// Frame failed to decode, error envelope echoed to the sender
    Malformed,
}

/// Result of one completed dispatch
#[derive(Debug, Clone, Copy)]
pub struct DispatchSummary {
    pub outcome: Outcome,
    pub report: DeliveryReport,
}

/// Routes inbound envelopes through the policy table to the registry
pub struct SignalingRouter {
    registry: Arc<ConnectionRegistry>,
}

impl SignalingRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Process one inbound frame from a connection
    ///
    /// Every path completes: success, unknown type, decode failure, and
    /// delivery failure each resolve to a reply and a summary. Nothing here
    /// tears down the connection - teardown is driven only by the transport's
    /// own terminal signal.
    pub async fn dispatch(&self, sender_id: &ConnectionId, raw: &str) -> DispatchSummary {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(connection_id = %sender_id, error = %e, "malformed signaling frame");
                let report = self.reply_error(sender_id, MALFORMED_DIAGNOSTIC).await;
                return DispatchSummary {
                    outcome: Outcome::Malformed,
                    report,
                };
            }
        };

        let Some(entry) = policy_for_wire(&envelope.kind) else {
            debug!(connection_id = %sender_id, kind = %envelope.kind, "unknown message type");
            let report = self.reply_error(sender_id, UNKNOWN_TYPE_DIAGNOSTIC).await;
            return DispatchSummary {
                outcome: Outcome::UnknownType,
                report,
            };
        };

        // The inbound payload is never mutated, only wrapped
        let outbound = Envelope::response(entry.response, envelope.data);
        let kind = entry.inbound;

        let targets = match entry.route {
            Route::Echo => vec![sender_id.clone()],
            Route::BroadcastOthers => self.registry.all_except(sender_id).await,
        };

        let report = self.registry.deliver(&targets, &outbound).await;
        if report.failed > 0 {
            warn!(
                connection_id = %sender_id,
                kind = kind.as_wire(),
                failed = report.failed,
                "delivery failures during fan-out"
            );
        }

        DispatchSummary {
            outcome: Outcome::Forwarded(kind),
            report,
        }
    }

    /// Reject a frame that is invalid before decoding even starts
    ///
    /// Used by the transport for frames the decoder never sees, such as a
    /// binary frame on this text protocol. The real cause goes to the log;
    /// the sender gets the same fixed malformed-envelope reply as any other
    /// undecodable frame.
    pub async fn reject_frame(&self, sender_id: &ConnectionId, cause: &str) -> DispatchSummary {
        warn!(connection_id = %sender_id, cause, "unsupported signaling frame");
        let report = self.reply_error(sender_id, MALFORMED_DIAGNOSTIC).await;
        DispatchSummary {
            outcome: Outcome::Malformed,
            report,
        }
    }

    async fn reply_error(&self, sender_id: &ConnectionId, diagnostic: &str) -> DeliveryReport {
        self.registry
            .deliver(&[sender_id.clone()], &Envelope::error(diagnostic))
            .await
    }
}
