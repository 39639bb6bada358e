//! Inbound frame decoding.
//!
//! Every message arriving on the wire is one of exactly two shapes:
//!
//! - a **response** to a previously issued command, carrying `id` and
//!   either `result` or `error`;
//! - an **event** notification, carrying `method` and `params`.
//!
//! Anything else is a malformed frame and fails the current wait.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

// ============================================================================
// Frame
// ============================================================================

/// A decoded inbound frame: response or event, never both.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Response correlated to an outgoing command by id.
    Response(CommandResponse),
    /// Out-of-band notification from the browser.
    Event(ProtocolEvent),
}

// ============================================================================
// CommandResponse
// ============================================================================

/// A response frame.
///
/// # Format
///
/// Success: `{ "id": 7, "result": { ... } }`
///
/// Error: `{ "id": 7, "error": { "code": -32601, "message": "..." } }`
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    /// Matches the command `id`.
    pub id: CommandId,

    /// Result data (if the command succeeded).
    #[serde(default)]
    pub result: Option<Value>,

    /// Remote error (if the command was rejected).
    #[serde(default)]
    pub error: Option<RemoteError>,
}

impl CommandResponse {
    /// Extracts the result value, converting a remote error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] with the remote code and message when
    /// the browser rejected the command.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::protocol(error.code, error.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// RemoteError
// ============================================================================

/// Error payload reported by the browser for a rejected command.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteError {
    /// Remote error code.
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// ProtocolEvent
// ============================================================================

/// An event frame.
///
/// # Format
///
/// ```json
/// { "method": "Network.responseReceived", "params": { ... } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolEvent {
    /// Event name in `Domain.event` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl ProtocolEvent {
    /// Returns the domain name from the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Looks up a string field in the event parameters.
    #[inline]
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes an inbound payload into a [`Frame`].
///
/// A frame carrying `id` is a response; a frame carrying `method` (and no
/// `id`) is an event.
///
/// # Errors
///
/// Returns [`Error::MalformedFrame`] if the payload is not valid JSON or
/// matches neither shape.
pub fn decode_frame(payload: &str) -> Result<Frame> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return Err(Error::malformed_frame(payload)),
    };

    if value.get("id").is_some() {
        let response: CommandResponse =
            serde_json::from_value(value).map_err(|_| Error::malformed_frame(payload))?;
        return Ok(Frame::Response(response));
    }

    if value.get("method").is_some() {
        let event: ProtocolEvent =
            serde_json::from_value(value).map_err(|_| Error::malformed_frame(payload))?;
        return Ok(Frame::Event(event));
    }

    Err(Error::malformed_frame(payload))
}

// ============================================================================
// Tests
// ============================================================================
