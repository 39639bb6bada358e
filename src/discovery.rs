//! Browser discovery over the HTTP debugging endpoints.
//!
//! Before any WebSocket session exists, the browser exposes a small
//! HTTP API on its debugging port: `/json/version` describes the
//! browser, `/json/list` enumerates open targets, `/json/new` opens a
//! tab and `/json/close/{id}` closes one.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::TargetId;

// ============================================================================
// Data
// ============================================================================

/// The `/json/version` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserInfo {
    /// Product string, e.g. `HeadlessChrome/120.0.6099.109`.
    #[serde(rename = "Browser", default)]
    pub browser: String,
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,
    /// Endpoint for a browser-wide (not per-target) session.
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: String,
}

impl BrowserInfo {
    /// Major browser version parsed out of the product string.
    #[must_use]
    pub fn major_version(&self) -> Option<u32> {
        let (_, version) = self.browser.split_once('/')?;
        let major = version.split('.').next()?;
        major.parse().ok()
    }
}

/// One entry of the `/json/list` reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Target kind: `page`, `iframe`, `service_worker`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    /// Endpoint to open a session on this target.
    #[serde(default)]
    pub web_socket_debugger_url: String,
}

impl TargetInfo {
    /// Returns `true` for ordinary page targets.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

// ============================================================================
// Browser
// ============================================================================

/// Handle on a running browser's HTTP debugging API.
#[derive(Debug, Clone)]
pub struct Browser {
    http_base: Url,
    client: reqwest::Client,
}

impl Browser {
    /// Points at a debugging endpoint, e.g. `http://localhost:9222`.
    ///
    /// No request is made until one of the query methods runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] for an unparseable URL.
    pub fn new(http_base: &str) -> Result<Self> {
        let http_base = Url::parse(http_base)
            .map_err(|e| Error::connection(format!("invalid endpoint url {http_base}: {e}")))?;
        Ok(Self {
            http_base,
            client: reqwest::Client::new(),
        })
    }

    /// Fetches browser identity and the browser-wide debugger URL.
    ///
    /// # Errors
    ///
    /// Propagates HTTP errors as [`Error::Http`].
    pub async fn version(&self) -> Result<BrowserInfo> {
        let info: BrowserInfo = self.get(&["json", "version"]).await?.json().await?;
        debug!(browser = %info.browser, "Queried browser version");
        Ok(info)
    }

    /// Lists the browser's open targets.
    ///
    /// # Errors
    ///
    /// Propagates HTTP errors as [`Error::Http`].
    pub async fn targets(&self) -> Result<Vec<TargetInfo>> {
        Ok(self.get(&["json", "list"]).await?.json().await?)
    }

    /// Opens a fresh tab and returns its target description.
    ///
    /// # Errors
    ///
    /// Propagates HTTP errors as [`Error::Http`].
    pub async fn open_tab(&self) -> Result<TargetInfo> {
        let target: TargetInfo = self.get(&["json", "new"]).await?.json().await?;
        debug!(id = %target.id, "Opened tab");
        Ok(target)
    }

    /// Opens a fresh tab already pointed at `url`.
    ///
    /// The target URL rides as the raw query of `/json/new`.
    ///
    /// # Errors
    ///
    /// Propagates HTTP errors as [`Error::Http`].
    pub async fn open_tab_at(&self, url: &str) -> Result<TargetInfo> {
        let mut endpoint = self.endpoint(&["json", "new"])?;
        endpoint.set_query(Some(url));
        let target: TargetInfo = self
            .client
            .get(endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(id = %target.id, url, "Opened tab");
        Ok(target)
    }

    /// Closes the target with `id`.
    ///
    /// # Errors
    ///
    /// Propagates HTTP errors as [`Error::Http`].
    pub async fn close_tab(&self, id: &TargetId) -> Result<()> {
        self.get(&["json", "close", id.as_str()]).await?;
        Ok(())
    }

    /// Builds the endpoint URL for one of the `/json` paths.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.http_base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::connection("endpoint url cannot carry a path"))?;
            path.extend(segments);
        }
        Ok(url)
    }

    /// Runs one GET against the endpoint and checks the status.
    async fn get(&self, segments: &[&str]) -> Result<reqwest::Response> {
        let url = self.endpoint(segments)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================
