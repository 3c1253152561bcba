//! Signaling Wire Envelope
//!
//! Defines the message unit exchanged over a signaling connection:
//! a JSON object with a `type` discriminator and an opaque `data` payload.
//! The payload is never inspected or validated here - it is carried as a
//! raw `serde_json::Value` and forwarded structure-for-structure.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Inbound message types recognized by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Offer,
    Answer,
    IceCandidate,
}

impl MessageType {
    /// Parse a wire `type` string; `None` means the unknown-type fallback applies
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "offer" => Some(Self::Offer),
            "answer" => Some(Self::Answer),
            "iceCandidate" => Some(Self::IceCandidate),
            _ => None,
        }
    }

    /// Wire representation of this type
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "iceCandidate",
        }
    }
}

/// Outbound derived message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    OfferResponse,
    AnswerResponse,
    IceCandidateResponse,
    Error,
}

impl ResponseType {
    /// Wire representation of this type
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::OfferResponse => "offerResponse",
            Self::AnswerResponse => "answerResponse",
            Self::IceCandidateResponse => "iceCandidateResponse",
            Self::Error => "error",
        }
    }
}

/// The typed, opaque-payload envelope exchanged over a connection
///
/// Both directions use the same shape: `{"type": <string>, "data": <opaque>}`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Message type discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload, forwarded unchanged
    pub data: Value,
}

impl Envelope {
    /// Build an outbound envelope of a derived type carrying the given payload
    pub fn response(kind: ResponseType, data: Value) -> Self {
        Self {
            kind: kind.as_wire().to_string(),
            data,
        }
    }

    /// Build the structured error envelope sent back to a misbehaving sender
    pub fn error(diagnostic: &str) -> Self {
        Self::response(ResponseType::Error, Value::String(diagnostic.to_string()))
    }

    /// Decode an inbound frame
    ///
    /// Fails only on transport-level malformation: non-JSON text, a non-object
    /// value, or a missing/non-string `type` key. An unrecognized `type` string
    /// is *not* a decode failure - that is the router's unknown-type fallback.
    pub fn decode(raw: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(raw).map_err(EnvelopeError::Json)?;

        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let kind = match map.remove("type") {
            Some(Value::String(s)) => s,
            Some(_) => return Err(EnvelopeError::MissingType),
            None => return Err(EnvelopeError::MissingType),
        };

        let data = map.remove("data").unwrap_or(Value::Null);

        Ok(Self { kind, data })
    }

    /// Serialize for the wire
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Json)
    }
}

/// Decode/encode failures for the wire envelope
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope has no string `type` key")]
    MissingType,
}
