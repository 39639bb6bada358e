//! WebSocket transport layer.
//!
//! One persistent, bidirectional message stream per debugging target:
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │ Session (Rust)  │         WebSocket            │  Chrome         │
//! │                 │◄────────────────────────────►│  debugging      │
//! │  Transport      │   ws://host:9222/devtools    │  endpoint       │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! The transport is exclusively owned by one session and deliberately has
//! no background reader: blocking calls pump [`Transport::receive`]
//! cooperatively, which is what keeps response correlation and page-state
//! tracking on a single logical thread.

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection to the debugging endpoint.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Received, Transport};
