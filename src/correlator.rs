//! Request/response correlation.
//!
//! Commands ride an asynchronous, multiplexed wire: responses arrive
//! interleaved with unrelated event frames and may be answered out of
//! order. The correlator assigns every outgoing command a strictly
//! increasing id, tracks it while in flight, and hands the matching
//! response back to exactly one waiter.
//!
//! The correlator never touches the transport; the session pumps frames
//! and feeds responses in via [`RequestCorrelator::resolve`].
//!
//! Fire-and-forget commands still get an id and a pending entry, but
//! their responses are dropped on arrival unless a waiter registered
//! interest via [`RequestCorrelator::expect_response`] first — retained
//! responses nobody will claim would otherwise accumulate for the whole
//! session.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::identifiers::CommandId;
use crate::protocol::CommandResponse;

// ============================================================================
// PendingRequest
// ============================================================================

/// An issued command whose response has not yet arrived.
#[derive(Debug)]
pub struct PendingRequest {
    /// The command id.
    pub id: CommandId,
    /// Method name, kept for diagnostics.
    pub method: String,
    /// When the command was issued.
    pub issued_at: Instant,
    /// Whether a waiter will claim the response.
    pub wants_response: bool,
}

// ============================================================================
// RequestCorrelator
// ============================================================================

/// Tracks in-flight commands and matches responses to them by id.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    next_id: u64,
    pending: FxHashMap<CommandId, PendingRequest>,
    resolved: FxHashMap<CommandId, CommandResponse>,
}

impl RequestCorrelator {
    /// Creates an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new command id and registers the request as in flight.
    ///
    /// Ids are strictly increasing, starting at 1. Id generation lives
    /// here, not in ambient mutable state, so a session's id stream is
    /// fully owned by its correlator.
    pub fn issue(&mut self, method: &str) -> CommandId {
        self.next_id += 1;
        let id = CommandId::new(self.next_id);
        self.pending.insert(
            id,
            PendingRequest {
                id,
                method: method.to_string(),
                issued_at: Instant::now(),
                wants_response: false,
            },
        );
        trace!(%id, method, "Issued command");
        id
    }

    /// Registers that a waiter will claim the response for `id`.
    ///
    /// Without this, [`RequestCorrelator::resolve`] drops the response on
    /// arrival instead of retaining it. No-op once the request is no
    /// longer pending.
    pub fn expect_response(&mut self, id: CommandId) {
        if let Some(request) = self.pending.get_mut(&id) {
            request.wants_response = true;
        }
    }

    /// Feeds an inbound response frame.
    ///
    /// Returns `true` if a pending request was resolved. Responses with no
    /// pending request (stale or duplicate) are discarded, and responses
    /// to fire-and-forget commands are dropped rather than retained.
    pub fn resolve(&mut self, response: CommandResponse) -> bool {
        let id = response.id;
        match self.pending.remove(&id) {
            Some(request) => {
                trace!(
                    %id,
                    method = %request.method,
                    elapsed_ms = request.issued_at.elapsed().as_millis() as u64,
                    "Resolved command"
                );
                if request.wants_response {
                    self.resolved.insert(id, response);
                }
                true
            }
            None => {
                warn!(%id, "Discarding response for unknown command");
                false
            }
        }
    }

    /// Claims the resolved response for `id`, if it has arrived.
    ///
    /// Each response can be claimed exactly once.
    pub fn take(&mut self, id: CommandId) -> Option<CommandResponse> {
        self.resolved.remove(&id)
    }

    /// Returns `true` if `id` is still awaiting its response.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: CommandId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Returns the number of in-flight requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the number of resolved-but-unclaimed responses.
    #[inline]
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Drops all in-flight and unclaimed state.
    ///
    /// Called on session closure so no stale response can ever satisfy a
    /// later await.
    pub fn clear(&mut self) {
        let dropped = self.pending.len();
        self.pending.clear();
        self.resolved.clear();
        if dropped > 0 {
            trace!(count = dropped, "Dropped pending requests on close");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
