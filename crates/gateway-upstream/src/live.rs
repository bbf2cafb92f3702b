//! Bidirectional live session transport.
//!
//! A [`LiveConnector`] dials the provider's WebSocket endpoint and sends the
//! session setup as the first frame. The resulting [`LiveSession`] exposes a
//! channel pair: frames go up through [`LiveSession::send`], provider events
//! come back through [`LiveSession::next_event`]. A single pump task owns the
//! socket, dropping the session handle tears it down.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use gateway_core::{GatewayError, GatewayResult};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

/// Frame sent into a live session
#[derive(Debug, Clone)]
pub enum LiveFrame {
    /// UTF-8 text payload
    Text(String),
    /// Binary payload
    Binary(Vec<u8>),
}

/// Event produced by a live session
#[derive(Debug)]
pub enum LiveEvent {
    /// Text payload from the provider
    Text(String),
    /// Binary payload from the provider
    Binary(Vec<u8>),
    /// The provider closed the session
    Closed {
        /// Close code, when the provider sent one
        code: Option<u16>,
        /// Close reason, empty when none was given
        reason: String,
    },
    /// The session failed
    Error(GatewayError),
}

/// Handle to an established live session
#[derive(Debug)]
pub struct LiveSession {
    outbound: mpsc::Sender<LiveFrame>,
    events: mpsc::Receiver<LiveEvent>,
}

impl LiveSession {
    /// Assemble a session from its channel halves
    #[must_use]
    pub fn new(outbound: mpsc::Sender<LiveFrame>, events: mpsc::Receiver<LiveEvent>) -> Self {
        Self { outbound, events }
    }

    /// Forward a frame to the provider
    ///
    /// # Errors
    /// Returns `UpstreamRuntime` when the session is already closed
    pub async fn send(&self, frame: LiveFrame) -> GatewayResult<()> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| GatewayError::upstream_runtime("live session closed"))
    }

    /// Receive the next session event, `None` once the session is gone
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }
}

/// Connector that dials the provider and performs session setup
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a live session: dial the endpoint and send the setup frame.
    /// Provider acknowledgements arrive as regular session events.
    ///
    /// # Errors
    /// `UpstreamConnect` when the dial or the setup send fails
    async fn connect(&self, key: &SecretString, setup: &Value) -> GatewayResult<LiveSession>;
}

/// Connector for the Gemini bidirectional generation endpoint
#[derive(Debug, Clone)]
pub struct GeminiLive {
    ws_url: String,
}

impl GeminiLive {
    /// Capacity of each session channel direction
    const CHANNEL_CAPACITY: usize = 32;

    /// Create a connector against the given WebSocket endpoint
    #[must_use]
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiLive {
    async fn connect(&self, key: &SecretString, setup: &Value) -> GatewayResult<LiveSession> {
        let url = format!("{}?key={}", self.ws_url, key.expose_secret());

        let (stream, _response) = connect_async(&url).await.map_err(|e| {
            GatewayError::upstream_connect(format!("WebSocket connect failed: {e}"), None)
        })?;
        debug!("Live session connected");

        let (mut sink, mut source) = stream.split();

        let setup_text = serde_json::to_string(setup)
            .map_err(|e| GatewayError::internal(format!("Failed to encode setup frame: {e}")))?;
        sink.send(Message::Text(setup_text)).await.map_err(|e| {
            GatewayError::upstream_connect(format!("Failed to send setup frame: {e}"), None)
        })?;

        let (out_tx, mut out_rx) = mpsc::channel::<LiveFrame>(Self::CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(Self::CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = out_rx.recv() => match frame {
                        Some(LiveFrame::Text(text)) => {
                            if sink.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(LiveFrame::Binary(data)) => {
                            if sink.send(Message::Binary(data)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            // Session handle dropped, close the upstream socket
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    message = source.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            if event_tx.send(LiveEvent::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if event_tx.send(LiveEvent::Binary(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = match frame {
                                Some(f) => (Some(u16::from(f.code)), f.reason.into_owned()),
                                None => (None, String::new()),
                            };
                            let _ = event_tx.send(LiveEvent::Closed { code, reason }).await;
                            break;
                        }
                        // Ping/Pong are answered by the library
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = event_tx
                                .send(LiveEvent::Error(GatewayError::upstream_runtime(format!(
                                    "live stream error: {e}"
                                ))))
                                .await;
                            break;
                        }
                        None => {
                            let _ = event_tx
                                .send(LiveEvent::Closed {
                                    code: None,
                                    reason: String::new(),
                                })
                                .await;
                            break;
                        }
                    },
                }
            }
            debug!("Live session pump finished");
        });

        Ok(LiveSession::new(out_tx, event_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};

    async fn spawn_echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(message)) = ws.next().await {
                        match message {
                            Message::Text(_) | Message::Binary(_) => {
                                if ws.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                });
            }
        });

        format!("ws://{addr}/live")
    }

    #[tokio::test]
    async fn test_connect_sends_setup_first() {
        let url = spawn_echo_server().await;
        let connector = GeminiLive::new(url);
        let key = SecretString::new("test-key".to_string());
        let setup = json!({"setup": {"model": "models/gemini-2.0-flash"}});

        let mut session = connector.connect(&key, &setup).await.unwrap();

        // The echo server reflects the setup frame back before anything else
        match session.next_event().await {
            Some(LiveEvent::Text(text)) => {
                let value: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(
                    value.pointer("/setup/model"),
                    Some(&json!("models/gemini-2.0-flash"))
                );
            }
            other => panic!("expected setup echo, got {other:?}"),
        }

        session
            .send(LiveFrame::Text(r#"{"realtimeInput":{}}"#.to_string()))
            .await
            .unwrap();
        match session.next_event().await {
            Some(LiveEvent::Text(text)) => assert_eq!(text, r#"{"realtimeInput":{}}"#),
            other => panic!("expected echoed frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_binary_frames_round_trip() {
        let url = spawn_echo_server().await;
        let connector = GeminiLive::new(url);
        let key = SecretString::new("test-key".to_string());

        let mut session = connector.connect(&key, &json!({"setup": {}})).await.unwrap();
        // Skip the echoed setup frame
        let _ = session.next_event().await;

        session
            .send(LiveFrame::Binary(vec![1, 2, 3]))
            .await
            .unwrap();
        match session.next_event().await {
            Some(LiveEvent::Binary(data)) => assert_eq!(data, vec![1, 2, 3]),
            other => panic!("expected binary echo, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_refused_maps_to_connect_error() {
        // Nothing listens on the discard port
        let connector = GeminiLive::new("ws://127.0.0.1:9");
        let key = SecretString::new("test-key".to_string());

        let result = connector.connect(&key, &json!({"setup": {}})).await;
        assert!(matches!(result, Err(GatewayError::UpstreamConnect { .. })));
    }

    #[tokio::test]
    async fn test_upstream_close_surfaces_code_and_reason() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                // Consume the setup frame, then close normally
                let _ = ws.next().await;
                let _ = ws
                    .send(Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "done".into(),
                    })))
                    .await;
            }
        });

        let connector = GeminiLive::new(format!("ws://{addr}/"));
        let key = SecretString::new("test-key".to_string());
        let mut session = connector.connect(&key, &json!({"setup": {}})).await.unwrap();

        match session.next_event().await {
            Some(LiveEvent::Closed { code, reason }) => {
                assert_eq!(code, Some(1000));
                assert_eq!(reason, "done");
            }
            other => panic!("expected close event, got {other:?}"),
        }
    }
}
