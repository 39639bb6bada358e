//! Script evaluation and result decoding.
//!
//! `Runtime.evaluate` returns a remote-object description, not a plain
//! value: primitives arrive inline, while objects and arrays must be
//! fetched property by property through `Runtime.getProperties`. This
//! module decodes that shape into [`ScriptValue`], including the
//! recursive fetch.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};

use super::{ScriptValue, Session};

// ============================================================================
// Constants
// ============================================================================

/// Error descriptions Chrome emits when the evaluation context's frame
/// has been detached; wording differs across versions.
static FRAME_GONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "Cannot read propert(?:y .document. of null|ies of null \\(reading .document.\\))",
    )
    .expect("valid pattern")
});

// ============================================================================
// Session - Script Execution
// ============================================================================

impl Session {
    /// Runs a script once the page is loaded, returning the raw
    /// `Runtime.evaluate` reply.
    ///
    /// # Errors
    ///
    /// Propagates pump, transport and protocol errors.
    pub async fn run_script(&mut self, script: &str) -> Result<Value> {
        self.wait_for_load().await?;
        self.send("Runtime.evaluate", json!({"expression": script}))
            .await
    }

    /// Fires a script without waiting for the page or the reply.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn run_async_script(&mut self, script: &str) -> Result<()> {
        self.send_async("Runtime.evaluate", json!({"expression": script}))
            .await?;
        Ok(())
    }

    /// Evaluates a script and decodes its result value.
    ///
    /// Two quirks are handled for callers that paste snippets verbatim:
    ///
    /// - a script that is a bare function literal is parenthesized so
    ///   the parser treats it as an expression;
    /// - a bare `return` at the top level is a syntax error in Chrome;
    ///   on that specific error the script is retried once wrapped in an
    ///   immediately-invoked function.
    ///
    /// # Errors
    ///
    /// - [`Error::Script`] if evaluation raised in the page
    /// - [`Error::NoSuchFrame`] if the target frame was detached
    pub async fn evaluate(&mut self, script: &str) -> Result<ScriptValue> {
        let mut script = prepare_script(script);
        let mut retried = false;

        loop {
            let reply = self.run_script(&script).await?;
            let remote = reply.get("result").cloned().unwrap_or(Value::Null);

            if remote.get("subtype").and_then(Value::as_str) == Some("error") {
                let class = remote
                    .get("className")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let description = remote
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default();

                if !retried && class == "SyntaxError" && description.contains("Illegal return") {
                    debug!("Retrying bare-return script as an IIFE");
                    script = format!("(function() {{{script}}}());");
                    retried = true;
                    continue;
                }
                if FRAME_GONE.is_match(description) {
                    return Err(Error::NoSuchFrame);
                }
                return Err(Error::script(description));
            }

            return self.decode_remote(remote).await;
        }
    }

    /// Decodes one remote-object description, recursing into arrays and
    /// plain objects via `Runtime.getProperties`.
    ///
    /// Boxed because the recursion depth follows the evaluated value's
    /// nesting.
    pub(crate) fn decode_remote(
        &mut self,
        remote: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ScriptValue>> + '_>> {
        Box::pin(async move {
            let kind = remote.get("type").and_then(Value::as_str).unwrap_or_default();
            let class = remote.get("className").and_then(Value::as_str);
            let subtype = remote.get("subtype").and_then(Value::as_str);
            let object_id = remote
                .get("objectId")
                .and_then(Value::as_str)
                .map(str::to_string);

            if kind == "undefined" {
                return Ok(ScriptValue::Null);
            }

            if kind == "object" {
                return match (subtype, class, object_id) {
                    (Some("null"), _, _) => Ok(ScriptValue::Null),
                    (Some("array"), Some("Array"), Some(id)) => {
                        let props = self.fetch_properties(&id).await?;
                        Ok(assemble_array(props))
                    }
                    // Dates, regexps, typed arrays: opaque on this wire.
                    (Some(_), _, _) => Ok(ScriptValue::Object(BTreeMap::new())),
                    (None, Some("Object"), Some(id)) => {
                        let props = self.fetch_properties(&id).await?;
                        Ok(ScriptValue::Object(props.into_iter().collect()))
                    }
                    (None, _, _) => Ok(inline_value(&remote)),
                };
            }

            Ok(inline_value(&remote))
        })
    }

    /// Fetches an object's own properties as decoded name/value pairs.
    ///
    /// `__proto__` and `length` are skipped, matching what callers of
    /// `evaluate` expect from plain data objects and arrays.
    async fn fetch_properties(&mut self, object_id: &str) -> Result<Vec<(String, ScriptValue)>> {
        let result = self
            .send(
                "Runtime.getProperties",
                json!({"objectId": object_id, "ownProperties": true}),
            )
            .await?;

        let props = result
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut decoded = Vec::with_capacity(props.len());
        for prop in props {
            let name = prop
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if name == "__proto__" || name == "length" {
                continue;
            }

            // Accessor properties carry no value descriptor.
            let Some(value) = prop.get("value") else {
                continue;
            };

            let vtype = value.get("type").and_then(Value::as_str);
            let vclass = value.get("className").and_then(Value::as_str);

            let item = if vtype == Some("object")
                && matches!(vclass, Some("Array") | Some("Object"))
            {
                self.decode_remote(value.clone()).await?
            } else if let Some(inline) = value.get("value") {
                ScriptValue::from_json(inline.clone())
            } else if vtype == Some("number") {
                match value.get("unserializableValue").and_then(Value::as_str) {
                    Some(raw) => parse_unserializable(raw),
                    None => return Err(Error::script("Property value not set")),
                }
            } else {
                return Err(Error::script("Property value not set"));
            };

            decoded.push((name, item));
        }

        Ok(decoded)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parenthesizes bare function literals so they evaluate as expressions.
fn prepare_script(script: &str) -> String {
    if script.starts_with("function") {
        let mut wrapped = format!("({script})");
        if wrapped.ends_with(";)") {
            wrapped.truncate(wrapped.len() - 2);
            wrapped.push(')');
        }
        wrapped
    } else {
        script.to_string()
    }
}

/// Decodes a primitive carried inline in a remote-object description.
fn inline_value(remote: &Value) -> ScriptValue {
    if let Some(value) = remote.get("value") {
        return ScriptValue::from_json(value.clone());
    }
    if remote.get("type").and_then(Value::as_str) == Some("number") {
        if let Some(raw) = remote.get("unserializableValue").and_then(Value::as_str) {
            return parse_unserializable(raw);
        }
    }
    ScriptValue::Null
}

/// Numbers JSON cannot carry arrive as strings: `NaN`, `Infinity`,
/// `-Infinity`, `-0`.
fn parse_unserializable(raw: &str) -> ScriptValue {
    let n = match raw {
        "NaN" => f64::NAN,
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        "-0" => -0.0,
        other => other.parse().unwrap_or(f64::NAN),
    };
    ScriptValue::Number(n)
}

/// Orders fetched array properties by their numeric index.
fn assemble_array(props: Vec<(String, ScriptValue)>) -> ScriptValue {
    let mut indexed: Vec<(usize, ScriptValue)> = props
        .into_iter()
        .filter_map(|(name, value)| name.parse::<usize>().ok().map(|i| (i, value)))
        .collect();
    indexed.sort_by_key(|(i, _)| *i);
    ScriptValue::Array(indexed.into_iter().map(|(_, value)| value).collect())
}

// ============================================================================
// Tests
// ============================================================================
