//! Synthetic keyboard and mouse input.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use tracing::trace;

use crate::error::Result;
use crate::identifiers::CommandId;

use super::Session;

// ============================================================================
// Constants
// ============================================================================

/// Windows virtual-key code for backspace.
const VK_BACKSPACE: u64 = 8;

/// Pause after releasing a mouse button, before waiting for the page.
///
/// Click handlers that start a navigation need a moment to run before
/// the load tracker sees the first frame event.
const CLICK_SETTLE: Duration = Duration::from_millis(5);

// ============================================================================
// Session - Keyboard
// ============================================================================

impl Session {
    /// Sends a backspace keystroke to the focused element.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn clear_focused_input(&mut self) -> Result<()> {
        self.send_async(
            "Input.dispatchKeyEvent",
            json!({
                "type": "rawKeyDown",
                "windowsVirtualKeyCode": VK_BACKSPACE,
                "nativeVirtualKeyCode": VK_BACKSPACE,
            }),
        )
        .await?;
        self.send_async("Input.dispatchKeyEvent", json!({"type": "keyUp"}))
            .await?;
        Ok(())
    }

    /// Types `text` into the focused element, one key event pair per
    /// character.
    ///
    /// Newlines are sent as carriage returns, which is what the browser
    /// produces for a physical Enter press.
    ///
    /// Only the final key event is awaited; its response confirms the
    /// whole ordered batch was received.
    ///
    /// # Errors
    ///
    /// Propagates transport and protocol errors.
    pub async fn simulate_typing(&mut self, text: &str) -> Result<()> {
        trace!(len = text.len(), "Typing");

        let mut last: Option<CommandId> = None;
        for ch in text.chars() {
            let ch = if ch == '\n' { '\r' } else { ch };
            self.send_async(
                "Input.dispatchKeyEvent",
                json!({"type": "keyDown", "text": ch.to_string()}),
            )
            .await?;
            let id = self
                .send_async("Input.dispatchKeyEvent", json!({"type": "keyUp"}))
                .await?;
            last = Some(id);
        }

        if let Some(id) = last {
            self.await_response(id).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Session - Mouse
// ============================================================================

impl Session {
    /// Moves the mouse pointer to viewport coordinates.
    ///
    /// With `wait` set, blocks until the browser acknowledges — needed
    /// before a press that must land on the element now under the
    /// pointer.
    ///
    /// # Errors
    ///
    /// Propagates transport and protocol errors.
    pub async fn move_mouse(&mut self, x: i64, y: i64, wait: bool) -> Result<()> {
        let params = json!({"type": "mouseMoved", "x": x, "y": y});
        if wait {
            self.send("Input.dispatchMouseEvent", params).await?;
        } else {
            self.send_async("Input.dispatchMouseEvent", params).await?;
        }
        Ok(())
    }

    /// Presses a mouse button at viewport coordinates.
    ///
    /// `click_count` is `2` for the press half of a double-click.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn press_mouse_button(
        &mut self,
        x: i64,
        y: i64,
        button: &str,
        click_count: Option<u32>,
    ) -> Result<()> {
        let mut params = json!({
            "type": "mousePressed",
            "x": x,
            "y": y,
            "button": button,
        });
        if let Some(count) = click_count {
            params["clickCount"] = json!(count);
        }
        self.send_async("Input.dispatchMouseEvent", params).await?;
        Ok(())
    }

    /// Releases a mouse button and waits for any resulting navigation.
    ///
    /// # Errors
    ///
    /// Propagates transport and protocol errors; see
    /// [`Session::wait_for_load`] for the interrupted-load case.
    pub async fn release_mouse_button(
        &mut self,
        x: i64,
        y: i64,
        button: &str,
        click_count: Option<u32>,
    ) -> Result<()> {
        let mut params = json!({
            "type": "mouseReleased",
            "x": x,
            "y": y,
            "button": button,
        });
        if let Some(count) = click_count {
            params["clickCount"] = json!(count);
        }
        self.send("Input.dispatchMouseEvent", params).await?;

        // Give onclick handlers time to kick off their navigation.
        sleep(CLICK_SETTLE).await;
        self.wait_for_load().await
    }
}
