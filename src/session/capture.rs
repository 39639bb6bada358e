//! Screenshots, PDF printing, viewport emulation and file inputs.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};

use super::Session;

// ============================================================================
// Session - Capture
// ============================================================================

impl Session {
    /// Captures a screenshot of the page.
    ///
    /// `options` passes through to `Page.captureScreenshot` (format,
    /// quality, clip rectangle).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the reply carries no
    /// decodable image data.
    pub async fn capture_screenshot(&mut self, options: Value) -> Result<Vec<u8>> {
        let result = self.send("Page.captureScreenshot", options).await?;
        decode_payload(&result, "Page.captureScreenshot")
    }

    /// Renders the page to PDF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the reply carries no
    /// decodable document data.
    pub async fn print_to_pdf(&mut self, options: Value) -> Result<Vec<u8>> {
        let result = self.send("Page.printToPDF", options).await?;
        decode_payload(&result, "Page.printToPDF")
    }
}

// ============================================================================
// Session - Emulation
// ============================================================================

impl Session {
    /// Overrides the viewport to `width` x `height` CSS pixels.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn set_visible_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.send_async(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 0,
                "mobile": false,
                "fitWindow": false,
            }),
        )
        .await?;
        self.send_async(
            "Emulation.setVisibleSize",
            json!({"width": width, "height": height}),
        )
        .await?;
        Ok(())
    }

    /// Maximizes the browser window hosting this target.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn maximize(&mut self) -> Result<()> {
        self.send_async(
            "Browser.setWindowBounds",
            json!({"windowId": 1, "bounds": {"windowState": "maximized"}}),
        )
        .await?;
        Ok(())
    }

    /// Configures where (and whether) the browser saves downloads.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn set_download_behavior(&mut self, params: Value) -> Result<()> {
        self.send_async("Page.setDownloadBehavior", params).await?;
        Ok(())
    }

    /// Enables or disables the certificate-error override.
    ///
    /// While enabled, `Security.certificateError` events are answered
    /// with `continue` by the pump, so self-signed hosts load.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn set_override_certificate_errors(&mut self, accept: bool) -> Result<()> {
        self.send_async("Security.enable", json!({})).await?;
        self.send_async(
            "Security.setOverrideCertificateErrors",
            json!({"override": accept}),
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// Session - File Inputs
// ============================================================================

impl Session {
    /// Attaches `path` to the file input whose `name` attribute matches.
    ///
    /// File inputs cannot be populated from script; this walks the
    /// flattened DOM for the node and sets the file on it directly. With
    /// `include_iframes`, the walk pierces into child frames.
    ///
    /// Returns `false` if no matching input exists.
    ///
    /// # Errors
    ///
    /// Propagates transport and protocol errors.
    pub async fn attach_file(
        &mut self,
        name: &str,
        path: &str,
        include_iframes: bool,
    ) -> Result<bool> {
        self.send_async("DOM.enable", json!({})).await?;
        let result = self
            .send("DOM.getFlattenedDocument", json!({"pierce": include_iframes}))
            .await?;

        let Some(node_id) = find_input_node(&result, name) else {
            debug!(name, "No file input with that name");
            return Ok(false);
        };

        self.send(
            "DOM.setFileInputFiles",
            json!({"nodeId": node_id, "files": [path]}),
        )
        .await?;
        Ok(true)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Decodes the base64 `data` field of a capture reply.
fn decode_payload(result: &Value, method: &str) -> Result<Vec<u8>> {
    let data = result
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::malformed_frame(&format!("{method}: no data field")))?;
    BASE64
        .decode(data)
        .map_err(|_| Error::malformed_frame(&format!("{method}: invalid base64 payload")))
}

/// Finds the node id of the `INPUT` element named `name` in a
/// `DOM.getFlattenedDocument` reply.
///
/// Node attributes arrive as a flat name/value pair list.
fn find_input_node(result: &Value, name: &str) -> Option<i64> {
    let nodes = result.get("nodes").and_then(Value::as_array)?;

    for node in nodes {
        if node.get("nodeName").and_then(Value::as_str) != Some("INPUT") {
            continue;
        }
        let Some(attributes) = node.get("attributes").and_then(Value::as_array) else {
            continue;
        };
        let named = attributes.chunks_exact(2).any(|pair| {
            pair[0].as_str() == Some("name") && pair[1].as_str() == Some(name)
        });
        if named {
            return node.get("nodeId").and_then(Value::as_i64);
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
