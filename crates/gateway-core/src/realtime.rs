//! Frame types and connection states for the realtime bridge.
//!
//! Client and server payloads are modelled as closed tagged sets so the
//! bridge's transition handling stays exhaustive. Frames recognized as data
//! are still forwarded from their original encoded text, never re-serialized.

use std::fmt;

use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Client to server frames, tagged by their single top-level key
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientFrame {
    /// Session setup; expected first and honored at most once
    Setup(SetupFrame),
    /// Realtime media or text input, forwarded verbatim
    RealtimeInput(Value),
    /// Tool invocation response, forwarded verbatim
    ToolResponse(Value),
}

/// Payload of a `setup` frame
#[derive(Debug, Clone, Deserialize)]
pub struct SetupFrame {
    /// Model to run the live session against
    #[serde(default)]
    pub model: Option<String>,

    /// Remaining session options, forwarded to the provider untouched
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl SetupFrame {
    /// Build the first upstream frame. The provider expects the model name
    /// qualified as `models/<name>` inside a `setup` envelope.
    #[must_use]
    pub fn into_upstream(self, default_model: &str) -> Value {
        let model = self
            .model
            .unwrap_or_else(|| default_model.to_string());
        let qualified = if model.starts_with("models/") {
            model
        } else {
            format!("models/{model}")
        };

        let mut setup = Map::new();
        setup.insert("model".to_string(), Value::String(qualified));
        for (name, value) in self.config {
            setup.insert(name, value);
        }

        json!({ "setup": setup })
    }
}

/// Server to client frames
#[derive(Debug, Clone)]
pub enum ServerFrame {
    /// Acknowledgement sent once the upstream session is established
    Open,
    /// Raw upstream event passed through untouched
    UpstreamEvent(String),
}

impl ServerFrame {
    /// Encode for the client socket
    #[must_use]
    pub fn encode(self) -> String {
        match self {
            Self::Open => json!({ "type": "open" }).to_string(),
            Self::UpstreamEvent(raw) => raw,
        }
    }
}

/// Lifecycle of one bridged connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Client socket accepted
    Open,
    /// A pool key is held for the connection
    KeyAcquired,
    /// Waiting for the client's setup frame
    AwaitingSetup,
    /// Both sides connected, frames flowing
    Bridged,
    /// Connection torn down
    Closed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::KeyAcquired => write!(f, "key_acquired"),
            Self::AwaitingSetup => write!(f, "awaiting_setup"),
            Self::Bridged => write!(f, "bridged"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
