//! WebSocket connection to the browser's debugging endpoint.
//!
//! One [`Transport`] owns one persistent connection for the lifetime of a
//! debugging target. There is no background reader task: callers pump
//! [`Transport::receive`] themselves, which keeps frame handling on a
//! single logical thread of control.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Maximum size of a single WebSocket message, in and out (256 MiB).
///
/// Chrome closes the connection when a logical message arrives split
/// across multiple frames, so the outgoing frame size must be large
/// enough to carry any single command atomically — including base64
/// screenshot payloads, which routinely exceed the 16 MiB default.
const MAX_MESSAGE_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// Received
// ============================================================================

/// Outcome of one [`Transport::receive`] poll.
#[derive(Debug)]
pub enum Received {
    /// A complete text frame arrived.
    Frame(String),
    /// Nothing arrived within the poll window; not an error.
    Idle,
    /// The peer closed the connection.
    Closed,
}

// ============================================================================
// Transport
// ============================================================================

/// Exclusive owner of the WebSocket stream to one debugging target.
///
/// All operations take `&mut self`; the connection is never shared, so
/// no locking is needed.
#[derive(Debug)]
pub struct Transport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl Transport {
    /// Opens the persistent connection to a debugging endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] when the endpoint refuses or the
    /// handshake fails.
    pub async fn connect(endpoint_url: &str) -> Result<Self> {
        debug!(url = %endpoint_url, "Connecting to debugging endpoint");

        let config = WebSocketConfig::default()
            .max_message_size(Some(MAX_MESSAGE_BYTES))
            .max_frame_size(Some(MAX_MESSAGE_BYTES));

        let (stream, _) = connect_async_with_config(endpoint_url, Some(config), true)
            .await
            .map_err(|e| Error::connection(e.to_string()))?;

        debug!(url = %endpoint_url, "Connection established");

        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Sends one logical message as a single unfragmented text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionLost`] if the connection is gone,
    /// [`Error::WebSocket`] for other transmission failures.
    pub async fn send(&mut self, payload: String) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionLost);
        }

        trace!(len = payload.len(), "Sending frame");

        match self.stream.send(Message::Text(payload.into())).await {
            Ok(()) => Ok(()),
            Err(e) if is_closed_error(&e) => {
                self.closed = true;
                Err(Error::ConnectionLost)
            }
            Err(e) => Err(Error::WebSocket(e)),
        }
    }

    /// Polls for the next inbound frame.
    ///
    /// A read that times out after `idle` is reported as
    /// [`Received::Idle`] — an idle connection is not a disconnect, and
    /// the caller simply pumps again. Pings are answered internally and
    /// never surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] for stream errors that are not an
    /// end-of-stream condition.
    pub async fn receive(&mut self, idle: Duration) -> Result<Received> {
        if self.closed {
            return Ok(Received::Closed);
        }

        loop {
            let next = match timeout(idle, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(Received::Idle),
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "Received frame");
                    return Ok(Received::Frame(text.to_string()));
                }

                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        warn!(error = %e, "Failed to answer ping");
                    }
                }

                Some(Ok(Message::Close(_))) => {
                    debug!("Peer closed the connection");
                    self.closed = true;
                    return Ok(Received::Closed);
                }

                // Binary and pong frames are not part of the protocol.
                Some(Ok(_)) => {}

                Some(Err(e)) if is_closed_error(&e) => {
                    debug!(error = %e, "Connection ended");
                    self.closed = true;
                    return Ok(Received::Closed);
                }

                Some(Err(e)) => {
                    self.closed = true;
                    return Err(Error::WebSocket(e));
                }

                None => {
                    debug!("Stream ended");
                    self.closed = true;
                    return Ok(Received::Closed);
                }
            }
        }
    }

    /// Returns `true` if the connection is known to be gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the connection, best-effort.
    ///
    /// Disconnection errors are swallowed: cleanup after a browser
    /// process that already died must not itself fail.
    pub async fn close(&mut self) {
        if !self.closed {
            if let Err(e) = self.stream.close(None).await {
                debug!(error = %e, "Ignoring error during close");
            }
            self.closed = true;
        }
    }
}

/// Returns `true` for stream errors that mean "the connection is gone"
/// rather than a protocol failure.
fn is_closed_error(error: &WsError) -> bool {
    matches!(
        error,
        WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Io(_)
    )
}

// ============================================================================
// Tests
// ============================================================================
