//! Cookie access and extra request headers.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::Result;

use super::Session;

// ============================================================================
// Cookie
// ============================================================================

/// One cookie as reported by `Network.getCookies`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    /// Expiry as a unix timestamp; `-1` for session cookies.
    #[serde(default)]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

impl Cookie {
    /// The cookie value with percent-encoding undone.
    ///
    /// Values written through [`Session::set_cookie`] are
    /// percent-encoded on the way in; this is the matching read.
    #[must_use]
    pub fn decoded_value(&self) -> Cow<'_, str> {
        urlencoding::decode(&self.value).unwrap_or(Cow::Borrowed(&self.value))
    }
}

// ============================================================================
// Session - Cookies
// ============================================================================

impl Session {
    /// Returns the cookies visible to the current page.
    ///
    /// # Errors
    ///
    /// Propagates transport and protocol errors.
    pub async fn get_cookies(&mut self) -> Result<Vec<Cookie>> {
        let result = self.send("Network.getCookies", json!({})).await?;
        let cookies = match result.get("cookies") {
            Some(list) => serde_json::from_value(list.clone())?,
            None => Vec::new(),
        };
        Ok(cookies)
    }

    /// Deletes every cookie in the browser.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn delete_all_cookies(&mut self) -> Result<()> {
        self.send_async("Network.clearBrowserCookies", json!({}))
            .await?;
        Ok(())
    }

    /// Sets a cookie on the session's base URL, or deletes every cookie
    /// with `name` when `value` is `None`.
    ///
    /// The value is percent-encoded before it goes on the wire so
    /// arbitrary bytes survive the cookie grammar.
    ///
    /// Deletion targets each stored cookie on its own domain and path.
    /// Older browsers do not implement `Network.deleteCookies`; a
    /// method-not-found rejection falls back to the singular
    /// `Network.deleteCookie` form.
    ///
    /// # Errors
    ///
    /// Propagates transport and protocol errors.
    pub async fn set_cookie(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                let mut url = self.base_url.to_string();
                if !url.ends_with('/') {
                    url.push('/');
                }
                self.send_async(
                    "Network.setCookie",
                    json!({
                        "url": url,
                        "name": name,
                        "value": urlencoding::encode(value),
                    }),
                )
                .await?;
                Ok(())
            }
            None => self.delete_cookies_named(name).await,
        }
    }

    /// Deletes each stored cookie called `name`, per domain and path.
    async fn delete_cookies_named(&mut self, name: &str) -> Result<()> {
        let result = self.send("Network.getAllCookies", json!({})).await?;
        let cookies: Vec<Cookie> = match result.get("cookies") {
            Some(list) => serde_json::from_value(list.clone())?,
            None => Vec::new(),
        };

        for cookie in cookies.iter().filter(|c| c.name == name) {
            let url = format!("http://{}{}", cookie.domain, cookie.path);
            let id = self
                .send_async("Network.deleteCookies", json!({"name": name, "url": url}))
                .await?;
            match self.await_response(id).await {
                Ok(_) => {}
                Err(e) if e.is_method_not_found() => {
                    debug!("Network.deleteCookies unavailable, using deleteCookie");
                    self.send("Network.deleteCookie", json!({"cookieName": name, "url": url}))
                        .await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

// ============================================================================
// Session - Request Headers
// ============================================================================

impl Session {
    /// Adds a header to every request the page makes.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from pushing the header set.
    pub async fn set_request_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.request_headers
            .insert(name.to_string(), value.to_string());
        self.sync_request_headers().await
    }

    /// Removes a previously set request header.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from pushing the header set.
    pub async fn unset_request_header(&mut self, name: &str) -> Result<()> {
        self.request_headers.remove(name);
        self.sync_request_headers().await
    }

    /// Pushes the full extra-header set to the browser.
    ///
    /// The set is replaced wholesale on every change; there is no
    /// incremental form on the wire.
    pub(crate) async fn sync_request_headers(&mut self) -> Result<()> {
        let headers = json!({"headers": self.request_headers});
        self.send_async("Network.setExtraHTTPHeaders", headers)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_cookie_deserialize_defaults() {
        let cookie: Cookie = serde_json::from_value(json!({"name": "sid"})).unwrap();
        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.value, "");
        assert!(!cookie.http_only);
        assert!(!cookie.secure);
    }

    #[test]
    fn test_cookie_decoded_value() {
        let cookie: Cookie =
            serde_json::from_value(json!({"name": "k", "value": "a%20b%2Fc"})).unwrap();
        assert_eq!(cookie.decoded_value(), "a b/c");
    }

    #[test]
    fn test_cookie_decoded_value_passthrough() {
        let cookie: Cookie =
            serde_json::from_value(json!({"name": "k", "value": "plain"})).unwrap();
        assert_eq!(cookie.decoded_value(), "plain");
    }
}
