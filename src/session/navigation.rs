//! Navigation, load waiting and response inspection.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::FrameId;
use crate::page::NetworkResponse;

use super::Session;

// ============================================================================
// Constants
// ============================================================================

/// Interval between predicate polls in [`Session::wait`].
const WAIT_POLL: Duration = Duration::from_millis(10);

// ============================================================================
// Session - Navigation
// ============================================================================

impl Session {
    /// Navigates to `url`.
    ///
    /// Returns as soon as the browser acknowledges the navigate command;
    /// it does not block until the load completes. Callers follow up
    /// with [`Session::wait_for_load`] or [`Session::get_response`], or
    /// rely on [`Session::evaluate`](Session::evaluate) which waits
    /// internally.
    ///
    /// # Errors
    ///
    /// Propagates transport and protocol errors from `Page.navigate`.
    pub async fn visit(&mut self, url: &str) -> Result<()> {
        debug!(url, "Navigating");

        self.send_async("Page.stopLoading", json!({})).await?;
        self.page.begin_navigation();

        let result = self.send("Page.navigate", json!({"url": url})).await?;
        if let Some(frame_id) = navigated_frame(&result) {
            self.page.register_navigation(frame_id);
        }
        Ok(())
    }

    /// Reloads the current page without waiting for the load to finish.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn reload(&mut self) -> Result<()> {
        self.page.mark_loading();
        self.send_async("Page.reload", json!({})).await?;
        Ok(())
    }

    /// Blocks until the page tracker reports the load complete.
    ///
    /// There is no timeout: an unresponsive browser hangs the caller,
    /// and closing the transport is the only way to abort.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PageLoadInterrupted`] wrapping
    /// [`Error::ConnectionLost`] if the transport dies first.
    pub async fn wait_for_load(&mut self) -> Result<()> {
        while !self.page.is_ready() {
            match self.pump().await {
                Ok(_) => {}
                Err(Error::ConnectionLost) => {
                    return Err(Error::page_load_interrupted(Error::ConnectionLost));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Returns the last top-level document response, blocking until one
    /// is captured and no document requests remain pending.
    ///
    /// Instant and cached navigations can complete without the network
    /// instrumentation observing anything; when the DOM reports
    /// `document.readyState == "complete"` in that situation, a default
    /// `200` response is synthesized.
    ///
    /// # Errors
    ///
    /// Propagates pump errors; see [`Session::wait_for_load`].
    pub async fn get_response(&mut self) -> Result<NetworkResponse> {
        if self.page.last_response().is_none() {
            let result = self
                .send(
                    "Runtime.evaluate",
                    json!({"expression": "document.readyState == \"complete\""}),
                )
                .await?;
            let dom_ready = result
                .get("result")
                .and_then(|r| r.get("value"))
                .and_then(Value::as_bool)
                .unwrap_or(false);

            if dom_ready && !self.page.is_ready() && self.page.last_response().is_none() {
                return Ok(NetworkResponse::synthetic());
            }

            self.wait_for_load().await?;
        }

        while self.page.pending_request_count() > 0 {
            self.pump().await?;
        }

        Ok(self
            .page
            .last_response()
            .cloned()
            .unwrap_or_else(NetworkResponse::synthetic))
    }

    /// Polls `predicate_script` every 10 ms until it evaluates truthy or
    /// the deadline passes; returns the last observed truth value.
    ///
    /// This is the only deadline-bounded operation on a session.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors.
    pub async fn wait(&mut self, timeout_ms: u64, predicate_script: &str) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let truthy = self.evaluate(predicate_script).await?.is_truthy();
            if truthy || Instant::now() >= deadline {
                return Ok(truthy);
            }
            sleep(WAIT_POLL).await;
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Extracts the navigated frame id from a `Page.navigate` result; Chrome
/// reports either `frameId` or `frame.id` depending on version.
fn navigated_frame(result: &Value) -> Option<FrameId> {
    result
        .get("frameId")
        .and_then(Value::as_str)
        .or_else(|| {
            result
                .get("frame")
                .and_then(|frame| frame.get("id"))
                .and_then(Value::as_str)
        })
        .map(FrameId::new)
}

// ============================================================================
// Tests
// ============================================================================
