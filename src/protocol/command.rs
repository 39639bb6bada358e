//! Outgoing command envelope.
//!
//! Commands are the only message type sent to the browser. Method names
//! follow the `Domain.command` convention (e.g. `Page.navigate`,
//! `Runtime.evaluate`).

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::CommandId;

// ============================================================================
// Command
// ============================================================================

/// A command envelope sent to the debugging endpoint.
///
/// # Format
///
/// ```json
/// { "id": 7, "method": "Page.navigate", "params": { "url": "..." } }
/// ```
///
/// `params` is dropped from the wire form entirely when the command takes
/// no parameters: some Chrome builds reject an empty-but-present `params`
/// field.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    /// Correlation id, unique and strictly increasing per session.
    pub id: CommandId,

    /// Method name in `Domain.command` format.
    pub method: String,

    /// Command parameters, absent when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Command {
    /// Creates a command, normalizing empty parameters to absent.
    ///
    /// `Value::Null` and `{}` are both treated as "no parameters".
    #[must_use]
    pub fn new(id: CommandId, method: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            other => Some(other),
        };
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Serializes the command to its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if a parameter value
    /// cannot be serialized.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
