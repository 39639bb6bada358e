//! Chrome DevTools driver - remote-debugging session core.
//!
//! This library drives a Chromium-family browser over its DevTools
//! debugging port: JSON commands and events over one WebSocket per
//! target, plus a small HTTP API for discovering and opening targets.
//!
//! # Architecture
//!
//! The driver is single-threaded and lock-free by construction:
//!
//! - A [`Session`] owns its WebSocket transport outright
//! - There is no background reader task; every blocking call pumps
//!   inbound frames itself until its own completion predicate holds
//! - Responses resolve in-flight commands, events feed the page tracker
//!
//! # Quick Start
//!
//! ```no_run
//! use chrome_devtools_driver::{Browser, Session, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Find the browser and open a tab
//!     let browser = Browser::new("http://localhost:9222")?;
//!     let tab = browser.open_tab().await?;
//!
//!     // Open a session on it
//!     let mut session = Session::connect(
//!         &tab.web_socket_debugger_url,
//!         "http://localhost:8000",
//!     )
//!     .await?;
//!     session.start().await?;
//!
//!     // Navigate and evaluate
//!     session.visit("http://localhost:8000/").await?;
//!     let title = session.evaluate("return document.title;").await?;
//!     println!("Page title: {:?}", title.as_str());
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`correlator`] | Matches command responses to in-flight requests |
//! | [`discovery`] | HTTP discovery of browsers and targets |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`page`] | Page load / dialog state tracking |
//! | [`protocol`] | Wire message types and frame decoding |
//! | [`session`] | The driver session and its operations |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Request/response correlation.
///
/// Issues command ids and matches responses back to them, out of order.
pub mod correlator;

/// HTTP discovery of browsers and targets.
///
/// Use [`Browser`] to query `/json/version`, list targets and open tabs.
pub mod discovery;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Page state tracking.
///
/// Folds protocol events into readiness, dialog and response state.
pub mod page;

/// Wire protocol message types.
///
/// Command serialization and inbound frame decoding.
pub mod protocol;

/// Driver sessions.
///
/// [`Session`] binds transport, correlator and page tracker to one
/// target and exposes navigation, evaluation, cookies, input and
/// capture operations.
pub mod session;

/// WebSocket transport layer.
///
/// Internal module handling connection, framing limits and keepalive.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use session::{Cookie, ScriptValue, Session};

// Discovery types
pub use discovery::{Browser, BrowserInfo, TargetInfo};

// Page state types
pub use page::{NetworkResponse, PageStatus};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, FrameId, NetworkRequestId, TargetId};
