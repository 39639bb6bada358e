//! Error types for the DevTools session core.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//! Errors propagate synchronously from the call that triggered them;
//! there is no background error queue.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::ConnectionLost`] |
//! | Protocol | [`Error::Protocol`], [`Error::MalformedFrame`] |
//! | Evaluation | [`Error::Script`], [`Error::NoSuchFrame`] |
//! | Page | [`Error::PageLoadInterrupted`], [`Error::BrowserCrashed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection could not be established.
    ///
    /// Returned when the debugging endpoint refuses or times out.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while a call was in flight.
    ///
    /// Every pending await observes this error instead of hanging.
    #[error("Connection lost")]
    ConnectionLost,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The browser rejected a command.
    ///
    /// Carries the remote-reported code; callers use
    /// [`Error::is_method_not_found`] to detect unsupported features and
    /// fall back to older command variants.
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// Remote error code (e.g. `-32601` for method not found).
        code: i64,
        /// Remote error message.
        message: String,
    },

    /// An inbound frame could not be decoded.
    ///
    /// The payload was not valid JSON, or matched neither the response
    /// shape nor the event shape. Fatal to the current wait.
    #[error("Malformed frame: {payload}")]
    MalformedFrame {
        /// The offending payload (possibly truncated).
        payload: String,
    },

    // ========================================================================
    // Evaluation Errors
    // ========================================================================
    /// Script evaluation raised an exception in the page.
    #[error("Script error: {description}")]
    Script {
        /// Exception description from the browser.
        description: String,
    },

    /// The frame targeted by an evaluation no longer exists.
    #[error("The iframe no longer exists")]
    NoSuchFrame,

    // ========================================================================
    // Page Errors
    // ========================================================================
    /// Waiting for a page load was interrupted by a transport failure.
    #[error("Page load interrupted: {source}")]
    PageLoadInterrupted {
        /// The underlying transport error.
        #[source]
        source: Box<Error>,
    },

    /// The inspected target crashed.
    ///
    /// Fatal and non-recoverable; the session must be torn down and a new
    /// one started by the caller.
    #[error("Browser crashed")]
    BrowserCrashed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP discovery error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error from a remote code and message.
    #[inline]
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Creates a malformed frame error, truncating oversized payloads.
    pub fn malformed_frame(payload: &str) -> Self {
        const MAX_PAYLOAD: usize = 256;
        let payload = if payload.len() > MAX_PAYLOAD {
            let cut = payload
                .char_indices()
                .take_while(|(i, _)| *i < MAX_PAYLOAD)
                .last()
                .map_or(0, |(i, c)| i + c.len_utf8());
            format!("{}...", &payload[..cut])
        } else {
            payload.to_string()
        };
        Self::MalformedFrame { payload }
    }

    /// Creates a script evaluation error.
    #[inline]
    pub fn script(description: impl Into<String>) -> Self {
        Self::Script {
            description: description.into(),
        }
    }

    /// Wraps a transport error observed while waiting for a page load.
    #[inline]
    pub fn page_load_interrupted(source: Error) -> Self {
        Self::PageLoadInterrupted {
            source: Box::new(source),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionLost | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the browser reported the command as unsupported.
    ///
    /// Chrome answers `-32601` (method not found) or `-32000` (generic
    /// server error on older builds) for commands the running browser mode
    /// does not implement. Callers use this to fall back to older code
    /// paths, e.g. `Network.deleteCookie` on pre-63 browsers.
    #[inline]
    #[must_use]
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, Self::Protocol { code, .. } if *code == -32601 || *code == -32000)
    }

    /// Returns `true` if this error is fatal to the session.
    ///
    /// Fatal errors require the caller to tear down the session and start
    /// a new one.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BrowserCrashed) || self.is_connection_error()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");

        let err = Error::protocol(-32601, "'Network.deleteCookies' wasn't found");
        assert_eq!(
            err.to_string(),
            "Protocol error -32601: 'Network.deleteCookies' wasn't found"
        );
    }

    #[test]
    fn test_is_method_not_found() {
        assert!(Error::protocol(-32601, "method not found").is_method_not_found());
        assert!(Error::protocol(-32000, "not supported").is_method_not_found());
        assert!(!Error::protocol(-32602, "invalid params").is_method_not_found());
        assert!(!Error::ConnectionLost.is_method_not_found());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("refused").is_connection_error());
        assert!(Error::ConnectionLost.is_connection_error());
        assert!(!Error::BrowserCrashed.is_connection_error());
        assert!(!Error::script("boom").is_connection_error());
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::BrowserCrashed.is_fatal());
        assert!(Error::ConnectionLost.is_fatal());
        assert!(!Error::script("boom").is_fatal());
    }

    #[test]
    fn test_malformed_frame_truncates() {
        let long = "x".repeat(1000);
        let err = Error::malformed_frame(&long);
        match err {
            Error::MalformedFrame { payload } => {
                assert!(payload.len() <= 256 + 3);
                assert!(payload.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_page_load_interrupted_source() {
        let err = Error::page_load_interrupted(Error::ConnectionLost);
        assert_eq!(err.to_string(), "Page load interrupted: Connection lost");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
