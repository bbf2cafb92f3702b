//! Relay request and response types.
//!
//! The relay accepts an opaque provider payload plus a mode discriminator and
//! returns either one JSON document (`generate`) or a chunked stream of raw
//! text deltas (`stream`). Payloads are forwarded untouched; the gateway only
//! reads the provider response far enough to build the documented shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// Relay execution mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Single-shot generation returning one JSON document
    #[default]
    Generate,
    /// Server-streamed generation returning raw text deltas
    Stream,
}

/// Inbound relay request
#[derive(Debug, Clone, Deserialize)]
pub struct RelayRequest {
    /// Target model; falls back to the configured default when unset
    #[serde(default)]
    pub model: Option<String>,

    /// Provider-formatted conversation payload, forwarded opaquely
    pub contents: Value,

    /// Provider-formatted generation options, merged into the upstream body
    #[serde(default)]
    pub config: Option<Map<String, Value>>,

    /// Execution mode
    #[serde(default)]
    pub mode: RelayMode,
}

impl RelayRequest {
    /// Build the upstream request body: `contents` plus every `config` entry
    /// merged at the top level.
    #[must_use]
    pub fn upstream_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("contents".to_string(), self.contents.clone());
        if let Some(config) = &self.config {
            for (name, value) in config {
                body.insert(name.clone(), value.clone());
            }
        }
        Value::Object(body)
    }
}

/// Unary relay response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Concatenated text parts of the first candidate
    pub text: String,

    /// Raw candidate list as returned by the provider
    pub candidates: Value,

    /// Function call payloads found in the first candidate; serialized as
    /// an explicit `null` when the candidate carries none
    pub function_calls: Option<Value>,
}

impl GenerateResponse {
    /// Extract the response shape from a raw upstream generation document.
    ///
    /// # Errors
    /// Returns [`GatewayError::UpstreamRuntime`] when the document carries no
    /// candidates.
    pub fn from_upstream(raw: &Value) -> Result<Self, GatewayError> {
        let candidates = raw
            .get("candidates")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        let first = candidates
            .get(0)
            .ok_or_else(|| GatewayError::upstream_runtime("no candidates in response"))?;

        let parts = first.pointer("/content/parts").and_then(Value::as_array);

        let text = parts
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let calls: Vec<Value> = parts
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("functionCall").cloned())
                    .collect()
            })
            .unwrap_or_default();

        let function_calls = if calls.is_empty() {
            None
        } else {
            Some(Value::Array(calls))
        };

        Ok(Self {
            text,
            candidates,
            function_calls,
        })
    }
}
