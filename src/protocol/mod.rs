//! Wire codec for the DevTools debugging protocol.
//!
//! JSON messages ride a persistent WebSocket connection to the browser's
//! debugging endpoint.
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Command`] | Driver → Browser | Command request |
//! | [`Frame::Response`] | Browser → Driver | Command response |
//! | [`Frame::Event`] | Browser → Driver | Browser notification |
//!
//! Method names follow `Domain.command` / `Domain.event` conventions:
//! `Page.navigate`, `Runtime.evaluate`, `Network.responseReceived`.

// ============================================================================
// Submodules
// ============================================================================

/// Outgoing command envelope.
pub mod command;

/// Inbound frame decoding.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use frame::{CommandResponse, Frame, ProtocolEvent, RemoteError, decode_frame};
