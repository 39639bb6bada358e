//! Core Session struct, command sending and the frame pump.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, trace, warn};
use url::Url;

use crate::correlator::RequestCorrelator;
use crate::error::{Error, Result};
use crate::identifiers::{CommandId, TargetId};
use crate::page::{FollowUp, PageState, PageStatus};
use crate::protocol::{Command, Frame, decode_frame};
use crate::transport::{Received, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Poll window for one pump iteration.
///
/// An idle read of this length is not a disconnect; the pump simply
/// checks its completion predicate and reads again.
pub(crate) const IDLE_POLL: Duration = Duration::from_millis(10);

/// Playback rate applied to CSS animations at session start.
///
/// Test suites should not spend wall-clock time watching transitions.
const ANIMATION_PLAYBACK_RATE: u64 = 100_000;

// ============================================================================
// Session
// ============================================================================

/// A driver session bound to one browser tab/target.
///
/// The session composes the transport, the request correlator and the
/// page tracker. There is no background task and no listener list: every
/// blocking call pumps inbound frames itself, dispatching responses to
/// the correlator and events to the page tracker until its own
/// completion predicate holds. A single blocking call therefore also
/// advances page-state tracking for unrelated events — callers must not
/// assume isolation between "send a command" and "background event
/// processing".
///
/// All operations take `&mut self`; nothing on a session ever runs in
/// parallel with anything else on the same session.
pub struct Session {
    pub(crate) transport: Transport,
    pub(crate) correlator: RequestCorrelator,
    pub(crate) page: PageState,
    pub(crate) request_headers: HashMap<String, String>,
    pub(crate) base_url: Url,
    target_id: Option<TargetId>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target_id", &self.target_id)
            .field("status", &self.page.status())
            .field("pending", &self.correlator.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Opens a session on a debugging endpoint.
    ///
    /// `base_url` anchors relative cookie URLs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the endpoint refuses, or a URL
    /// parse error mapped to [`Error::Connection`] for a bad `base_url`.
    pub async fn connect(endpoint_url: &str, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::connection(format!("invalid base url {base_url}: {e}")))?;
        let transport = Transport::connect(endpoint_url).await?;

        Ok(Self {
            transport,
            correlator: RequestCorrelator::new(),
            page: PageState::new(),
            request_headers: HashMap::new(),
            base_url,
            target_id: None,
        })
    }

    /// Enables the protocol domains the session relies on and returns
    /// the active target id.
    ///
    /// # Errors
    ///
    /// Propagates transport and protocol errors from the enabling
    /// commands.
    pub async fn start(&mut self) -> Result<TargetId> {
        self.send_async("Page.enable", json!({})).await?;
        self.send_async("DOM.enable", json!({})).await?;
        self.send_async("Network.enable", json!({})).await?;
        self.send_async("Runtime.enable", json!({})).await?;
        self.send_async("Target.setDiscoverTargets", json!({"discover": true}))
            .await?;
        self.send_async(
            "Animation.setPlaybackRate",
            json!({"playbackRate": ANIMATION_PLAYBACK_RATE}),
        )
        .await?;
        self.sync_request_headers().await?;

        let result = self.send("Target.getTargetInfo", json!({})).await?;
        let target_id = result
            .get("targetInfo")
            .and_then(|info| info.get("targetId"))
            .and_then(Value::as_str)
            .map(TargetId::new)
            .ok_or_else(|| Error::malformed_frame("Target.getTargetInfo: no targetId"))?;

        debug!(target = %target_id, "Session started");
        self.target_id = Some(target_id.clone());
        Ok(target_id)
    }

    /// Returns the target this session is attached to, once started.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> Option<&TargetId> {
        self.target_id.as_ref()
    }

    /// Returns the derived page status.
    #[inline]
    #[must_use]
    pub fn page_status(&self) -> PageStatus {
        self.page.status()
    }

    /// Returns `true` while a javascript dialog is open.
    #[inline]
    #[must_use]
    pub fn has_javascript_dialog(&self) -> bool {
        self.page.has_dialog()
    }

    /// Clears captured response state and extra request headers.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from re-pushing the (now empty)
    /// header set.
    pub async fn reset(&mut self) -> Result<()> {
        self.page.clear_response();
        self.request_headers.clear();
        self.sync_request_headers().await
    }

    /// Closes the session: asks the browser to close the target, tears
    /// down the transport and discards all pending state.
    ///
    /// Never fails — cleanup after a browser that already died must not
    /// itself error.
    pub async fn close(&mut self) {
        if let Some(target_id) = self.target_id.clone() {
            let closed = self
                .send_async("Target.closeTarget", json!({"targetId": target_id}))
                .await;
            if let Err(e) = closed {
                debug!(error = %e, "Ignoring close command failure");
            }
        }
        self.transport.close().await;
        self.correlator.clear();
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Sends a command and blocks until its response arrives.
    ///
    /// While blocked, the pump keeps feeding unrelated responses to the
    /// correlator and events to the page tracker; nothing is lost.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the browser rejected the command
    /// - [`Error::ConnectionLost`] if the transport dies first
    pub async fn send(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.send_async(method, params).await?;
        self.await_response(id).await
    }

    /// Sends a command without waiting for its response.
    ///
    /// The response still drains the in-flight entry when it arrives,
    /// but is dropped unless [`Session::await_response`] is called with
    /// the returned id before the next pump.
    pub async fn send_async(&mut self, method: &str, params: Value) -> Result<CommandId> {
        let id = self.correlator.issue(method);
        let command = Command::new(id, method, params);
        trace!(%id, method, "Sending command");
        self.transport.send(command.encode()?).await?;
        Ok(id)
    }

    /// Pumps inbound frames until the response for `id` arrives.
    ///
    /// Must be called before any intervening pump: registering interest
    /// is what stops the correlator from dropping the response on
    /// arrival.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the command was answered with an error
    /// - [`Error::ConnectionLost`] if the transport closes; every other
    ///   in-flight await observes the same failure instead of hanging
    pub async fn await_response(&mut self, id: CommandId) -> Result<Value> {
        self.correlator.expect_response(id);
        loop {
            if let Some(response) = self.correlator.take(id) {
                return response.into_result();
            }
            self.pump().await?;
        }
    }

    /// Reads and dispatches at most one inbound frame.
    ///
    /// Returns `true` if a frame was processed, `false` on an idle poll.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionLost`] on transport closure (pending
    ///   requests are failed)
    /// - [`Error::MalformedFrame`] if a payload cannot be decoded
    /// - [`Error::BrowserCrashed`] if the target crashed
    pub(crate) async fn pump(&mut self) -> Result<bool> {
        match self.transport.receive(IDLE_POLL).await? {
            Received::Idle => Ok(false),
            Received::Closed => {
                warn!("Transport closed with calls in flight");
                self.correlator.clear();
                Err(Error::ConnectionLost)
            }
            Received::Frame(payload) => {
                let frame = decode_frame(&payload)?;
                self.dispatch(frame).await?;
                Ok(true)
            }
        }
    }

    /// Routes one decoded frame: responses to the correlator, events to
    /// the page tracker.
    async fn dispatch(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Response(response) => {
                self.correlator.resolve(response);
            }
            Frame::Event(event) => {
                trace!(method = %event.method, "Event");
                if let Some(follow_up) = self.page.handle_event(&event)? {
                    self.handle_follow_up(follow_up).await?;
                }
            }
        }
        Ok(())
    }

    /// Issues the command an event demanded.
    ///
    /// Sent asynchronously: replying from inside the pump must not pump
    /// recursively.
    async fn handle_follow_up(&mut self, follow_up: FollowUp) -> Result<()> {
        match follow_up {
            FollowUp::ContinueCertificateError { event_id } => {
                debug!(event_id, "Continuing past certificate error");
                self.send_async(
                    "Security.handleCertificateError",
                    json!({"eventId": event_id, "action": "continue"}),
                )
                .await?;
                Ok(())
            }
        }
    }
}

// ============================================================================
// Session - Dialogs
// ============================================================================

impl Session {
    /// Accepts the open javascript dialog, typing `text` into prompts.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn accept_alert(&mut self, text: &str) -> Result<()> {
        self.send_async(
            "Page.handleJavaScriptDialog",
            json!({"accept": true, "promptText": text}),
        )
        .await?;
        Ok(())
    }

    /// Dismisses the open javascript dialog.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn dismiss_alert(&mut self) -> Result<()> {
        self.send_async("Page.handleJavaScriptDialog", json!({"accept": false}))
            .await?;
        Ok(())
    }
}
