//! Reactive page state tracking.
//!
//! Chrome reports page activity as out-of-band event notifications with
//! no single "the page is ready" signal. [`PageState`] reconciles 10+
//! event types into two externally visible facts — "page load complete"
//! and "a javascript dialog is open" — plus the last top-level network
//! response.
//!
//! The tracker is fed synchronously by the session's pump loop; it never
//! reads the wire itself and never sends commands. When an event demands
//! a command in reply (certificate errors), the tracker hands a
//! [`FollowUp`] back to the pump instead.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;

use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{FrameId, NetworkRequestId};
use crate::protocol::ProtocolEvent;

// ============================================================================
// PageStatus
// ============================================================================

/// Externally visible page state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// Navigation or document requests are outstanding.
    Loading,
    /// No pending navigations, no pending document requests, no dialog.
    Ready,
    /// A javascript dialog is open; it blocks everything else.
    DialogBlocked,
}

// ============================================================================
// NetworkResponse
// ============================================================================

/// The top-level document response, as reported by
/// `Network.responseReceived`.
///
/// Sub-resource responses are never captured here.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkResponse {
    /// HTTP status code.
    #[serde(default)]
    pub status: u16,

    /// Response headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Final URL of the document.
    #[serde(default)]
    pub url: String,
}

impl NetworkResponse {
    /// Synthesizes the default response for navigations the network
    /// instrumentation never observed (instant or cached loads).
    #[must_use]
    pub fn synthetic() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            url: String::new(),
        }
    }
}

// ============================================================================
// FollowUp
// ============================================================================

/// A command the pump must issue in reaction to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Answer a `Security.certificateError` with `action: continue`.
    ContinueCertificateError {
        /// The certificate error event id to acknowledge.
        event_id: u64,
    },
}

// ============================================================================
// PageState
// ============================================================================

/// State machine deriving page readiness from protocol events.
///
/// Readiness drops to [`PageStatus::Loading`] immediately on any
/// frame-start, navigation or document-request event; it returns to
/// [`PageStatus::Ready`] only once both pending sets have drained. An
/// open dialog always wins over readiness.
#[derive(Debug, Default)]
pub struct PageState {
    ready: bool,
    has_dialog: bool,
    last_response: Option<NetworkResponse>,
    pending_requests: FxHashSet<NetworkRequestId>,
    pending_navigations: FxHashSet<FrameId>,
}

impl PageState {
    /// Creates a tracker for a fresh, idle page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Returns the derived page status.
    #[must_use]
    pub fn status(&self) -> PageStatus {
        if self.has_dialog {
            PageStatus::DialogBlocked
        } else if self.ready {
            PageStatus::Ready
        } else {
            PageStatus::Loading
        }
    }

    /// Returns `true` when the page load is complete and no dialog blocks.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready && !self.has_dialog
    }

    /// Returns `true` while a javascript dialog is open.
    #[inline]
    #[must_use]
    pub fn has_dialog(&self) -> bool {
        self.has_dialog
    }

    /// Returns the last captured top-level response, if any.
    #[inline]
    #[must_use]
    pub fn last_response(&self) -> Option<&NetworkResponse> {
        self.last_response.as_ref()
    }

    /// Returns the number of outstanding document requests.
    #[inline]
    #[must_use]
    pub fn pending_request_count(&self) -> usize {
        self.pending_requests.len()
    }

    // ========================================================================
    // Session-driven transitions
    // ========================================================================

    /// Re-arms the tracker for an explicit navigation.
    ///
    /// Clears the captured response and both pending sets; the page stays
    /// not-ready until the navigation's completion events drain it.
    pub fn begin_navigation(&mut self) {
        self.ready = false;
        self.last_response = None;
        self.pending_requests.clear();
        self.pending_navigations.clear();
    }

    /// Drops readiness without touching the pending sets or the
    /// captured response (explicit reload).
    pub fn mark_loading(&mut self) {
        self.ready = false;
    }

    /// Registers the frame returned by a navigate command as pending.
    pub fn register_navigation(&mut self, frame_id: FrameId) {
        trace!(frame = %frame_id, "Navigation pending");
        self.ready = false;
        self.pending_navigations.insert(frame_id);
    }

    /// Forgets the captured response (session `reset`).
    pub fn clear_response(&mut self) {
        self.last_response = None;
    }

    // ========================================================================
    // Event dispatch
    // ========================================================================

    /// Feeds one inbound event through the state machine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrowserCrashed`] on `Inspector.targetCrashed`;
    /// the session is unusable afterwards.
    pub fn handle_event(&mut self, event: &ProtocolEvent) -> Result<Option<FollowUp>> {
        match event.method.as_str() {
            "Network.requestWillBeSent" => {
                if is_document(event) {
                    if let Some(id) = request_id(event) {
                        trace!(request = %id, "Document request started");
                        self.pending_requests.insert(id);
                        self.ready = false;
                    }
                }
            }

            "Network.responseReceived" => {
                if is_document(event) {
                    if let Some(id) = request_id(event) {
                        self.pending_requests.remove(&id);
                        if let Some(params) = event.params.get("response") {
                            match serde_json::from_value(params.clone()) {
                                Ok(response) => self.last_response = Some(response),
                                Err(e) => debug!(error = %e, "Unparseable document response"),
                            }
                        }
                        self.recompute();
                    }
                }
            }

            "Network.loadingFailed" => {
                let canceled = event
                    .params
                    .get("canceled")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if canceled {
                    if let Some(id) = request_id(event) {
                        self.pending_requests.remove(&id);
                        self.recompute();
                    }
                }
            }

            "Network.requestServedFromCache" => {
                if let Some(id) = request_id(event) {
                    self.pending_requests.remove(&id);
                    self.recompute();
                }
            }

            "Page.frameStartedLoading" | "Page.frameScheduledNavigation" => {
                if let Some(frame_id) = frame_id(event) {
                    trace!(frame = %frame_id, method = %event.method, "Frame loading");
                    self.ready = false;
                    self.last_response = None;
                    self.pending_navigations.insert(frame_id);
                }
            }

            "Page.frameNavigated" | "Page.frameStoppedLoading" => {
                if let Some(frame_id) = frame_id(event) {
                    self.pending_navigations.remove(&frame_id);
                }
                self.recompute();
            }

            "Page.javascriptDialogOpening" => {
                debug!("Javascript dialog opened");
                self.has_dialog = true;
            }

            "Page.javascriptDialogClosed" => {
                debug!("Javascript dialog closed");
                self.has_dialog = false;
                self.recompute();
            }

            "Security.certificateError" => {
                if let Some(event_id) = event.params.get("eventId").and_then(Value::as_u64) {
                    self.ready = false;
                    return Ok(Some(FollowUp::ContinueCertificateError { event_id }));
                }
            }

            "Inspector.targetCrashed" => {
                return Err(Error::BrowserCrashed);
            }

            _ => {}
        }

        Ok(None)
    }

    /// Readiness recomputation: both pending sets drained.
    ///
    /// Only ever promotes to ready; demotion happens eagerly in the event
    /// arms above.
    fn recompute(&mut self) {
        if self.pending_requests.is_empty() && self.pending_navigations.is_empty() {
            self.ready = true;
        }
    }
}

// ============================================================================
// Param helpers
// ============================================================================

/// Returns `true` for top-level document network events.
fn is_document(event: &ProtocolEvent) -> bool {
    event.param_str("type") == Some("Document")
}

/// Extracts the request id; a `Network.*` event without one is malformed
/// and gets ignored rather than aliased onto an empty-string id.
fn request_id(event: &ProtocolEvent) -> Option<NetworkRequestId> {
    event.param_str("requestId").map(NetworkRequestId::new)
}

/// Extracts the frame id; Chrome sends either `frameId` or `frame.id`
/// depending on the event and version.
fn frame_id(event: &ProtocolEvent) -> Option<FrameId> {
    event
        .param_str("frameId")
        .or_else(|| {
            event
                .params
                .get("frame")
                .and_then(|frame| frame.get("id"))
                .and_then(Value::as_str)
        })
        .map(FrameId::new)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn event(method: &str, params: Value) -> ProtocolEvent {
        ProtocolEvent {
            method: method.to_string(),
            params,
        }
    }

    fn feed(state: &mut PageState, method: &str, params: Value) -> Option<FollowUp> {
        state.handle_event(&event(method, params)).expect("event")
    }

    #[test]
    fn test_starts_ready() {
        let state = PageState::new();
        assert_eq!(state.status(), PageStatus::Ready);
        assert!(state.is_ready());
        assert!(state.last_response().is_none());
    }

    #[test]
    fn test_document_request_response_cycle() {
        let mut state = PageState::new();

        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "Document", "requestId": "1"}),
        );
        assert_eq!(state.status(), PageStatus::Loading);
        assert_eq!(state.pending_request_count(), 1);

        feed(
            &mut state,
            "Network.responseReceived",
            json!({
                "type": "Document",
                "requestId": "1",
                "response": {"status": 200, "url": "http://x/", "headers": {"Content-Type": "text/html"}}
            }),
        );

        // Pending set back to its prior size, response captured.
        assert_eq!(state.pending_request_count(), 0);
        assert_eq!(state.status(), PageStatus::Ready);
        let response = state.last_response().expect("captured");
        assert_eq!(response.status, 200);
        assert_eq!(response.url, "http://x/");
        assert_eq!(
            response.headers.get("Content-Type").map(String::as_str),
            Some("text/html")
        );
    }

    #[test]
    fn test_subresource_events_ignored() {
        let mut state = PageState::new();

        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "XHR", "requestId": "7"}),
        );
        assert_eq!(state.status(), PageStatus::Ready);

        feed(
            &mut state,
            "Network.responseReceived",
            json!({"type": "Stylesheet", "requestId": "7", "response": {"status": 404}}),
        );
        assert!(state.last_response().is_none());
    }

    #[test]
    fn test_canceled_and_cached_requests_drain() {
        let mut state = PageState::new();

        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "Document", "requestId": "1"}),
        );
        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "Document", "requestId": "2"}),
        );
        assert_eq!(state.pending_request_count(), 2);

        feed(
            &mut state,
            "Network.loadingFailed",
            json!({"requestId": "1", "canceled": true}),
        );
        assert_eq!(state.status(), PageStatus::Loading);

        feed(
            &mut state,
            "Network.requestServedFromCache",
            json!({"requestId": "2"}),
        );
        assert_eq!(state.status(), PageStatus::Ready);
    }

    #[test]
    fn test_network_events_without_request_id_ignored() {
        let mut state = PageState::new();

        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "Document"}),
        );
        assert_eq!(state.status(), PageStatus::Ready);
        assert_eq!(state.pending_request_count(), 0);

        // A real pending request is not drained by id-less events.
        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "Document", "requestId": "1"}),
        );
        feed(
            &mut state,
            "Network.requestServedFromCache",
            json!({}),
        );
        feed(
            &mut state,
            "Network.loadingFailed",
            json!({"canceled": true}),
        );
        assert_eq!(state.pending_request_count(), 1);
        assert_eq!(state.status(), PageStatus::Loading);
    }

    #[test]
    fn test_loading_failed_not_canceled_keeps_pending() {
        let mut state = PageState::new();
        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "Document", "requestId": "1"}),
        );
        feed(
            &mut state,
            "Network.loadingFailed",
            json!({"requestId": "1", "canceled": false}),
        );
        assert_eq!(state.status(), PageStatus::Loading);
    }

    #[test]
    fn test_navigate_scenario() {
        let mut state = PageState::new();

        // Page.navigate issued.
        state.begin_navigation();
        state.register_navigation(FrameId::new("F1"));
        assert_eq!(state.status(), PageStatus::Loading);

        feed(
            &mut state,
            "Page.frameStartedLoading",
            json!({"frameId": "F1"}),
        );
        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "Document", "requestId": "1"}),
        );
        feed(
            &mut state,
            "Network.responseReceived",
            json!({"type": "Document", "requestId": "1", "response": {"status": 200}}),
        );
        // Navigation still pending: not ready yet.
        assert_eq!(state.status(), PageStatus::Loading);

        feed(
            &mut state,
            "Page.frameStoppedLoading",
            json!({"frameId": "F1"}),
        );
        assert_eq!(state.status(), PageStatus::Ready);
        assert_eq!(state.last_response().expect("response").status, 200);
    }

    #[test]
    fn test_frame_navigated_nested_frame_shape() {
        let mut state = PageState::new();
        feed(
            &mut state,
            "Page.frameScheduledNavigation",
            json!({"frame": {"id": "F2"}}),
        );
        assert_eq!(state.status(), PageStatus::Loading);

        feed(
            &mut state,
            "Page.frameNavigated",
            json!({"frame": {"id": "F2"}}),
        );
        assert_eq!(state.status(), PageStatus::Ready);
    }

    #[test]
    fn test_dialog_always_wins() {
        let mut state = PageState::new();

        feed(&mut state, "Page.javascriptDialogOpening", json!({}));
        assert_eq!(state.status(), PageStatus::DialogBlocked);

        // Loading events do not displace the dialog.
        feed(
            &mut state,
            "Page.frameStartedLoading",
            json!({"frameId": "F1"}),
        );
        assert_eq!(state.status(), PageStatus::DialogBlocked);

        feed(
            &mut state,
            "Page.frameStoppedLoading",
            json!({"frameId": "F1"}),
        );
        // Readiness recomputes underneath, but the dialog still blocks.
        assert_eq!(state.status(), PageStatus::DialogBlocked);
        assert!(!state.is_ready());

        feed(&mut state, "Page.javascriptDialogClosed", json!({}));
        assert_eq!(state.status(), PageStatus::Ready);
    }

    #[test]
    fn test_certificate_error_requests_follow_up() {
        let mut state = PageState::new();
        let follow_up = feed(
            &mut state,
            "Security.certificateError",
            json!({"eventId": 12}),
        );
        assert_eq!(
            follow_up,
            Some(FollowUp::ContinueCertificateError { event_id: 12 })
        );
        assert_eq!(state.status(), PageStatus::Loading);
    }

    #[test]
    fn test_target_crash_is_fatal() {
        let mut state = PageState::new();
        let err = state
            .handle_event(&event("Inspector.targetCrashed", json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::BrowserCrashed));
    }

    #[test]
    fn test_begin_navigation_clears_state() {
        let mut state = PageState::new();
        feed(
            &mut state,
            "Network.requestWillBeSent",
            json!({"type": "Document", "requestId": "1"}),
        );
        feed(
            &mut state,
            "Network.responseReceived",
            json!({"type": "Document", "requestId": "1", "response": {"status": 500}}),
        );
        assert!(state.last_response().is_some());

        state.begin_navigation();
        assert!(state.last_response().is_none());
        assert_eq!(state.pending_request_count(), 0);
        assert_eq!(state.status(), PageStatus::Loading);
    }

    #[test]
    fn test_unknown_events_ignored() {
        let mut state = PageState::new();
        feed(&mut state, "DOM.documentUpdated", json!({}));
        feed(&mut state, "Animation.animationStarted", json!({}));
        assert_eq!(state.status(), PageStatus::Ready);
    }
}
