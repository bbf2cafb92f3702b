//! WebSocket bridge between clients and the upstream realtime API.
//!
//! A client connects, sends a `setup` frame, and the gateway dials the
//! upstream session with a pooled key. Once both legs are up, frames are
//! pumped in both directions until either side closes.

use std::borrow::Cow;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use gateway_core::{BridgeState, ClientFrame, ServerFrame};
use gateway_upstream::{LiveEvent, LiveFrame, LiveSession};
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::extractors::RequestId;
use crate::state::AppState;

/// Upgrade a GET request into a realtime bridge session.
pub async fn realtime_upgrade(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_bridge(state, request_id, socket))
}

async fn handle_bridge(state: AppState, request_id: String, socket: WebSocket) {
    info!(request_id = %request_id, state = %BridgeState::Open, "Realtime session opened");
    run_bridge(&state, &request_id, socket).await;
    info!(request_id = %request_id, state = %BridgeState::Closed, "Realtime session closed");
}

async fn run_bridge(state: &AppState, request_id: &str, mut socket: WebSocket) {
    let key = match state.keys.acquire() {
        Ok(key) => key,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Rejecting realtime session");
            close_socket(socket, e.close_code(), e.to_string()).await;
            return;
        }
    };

    debug!(request_id = %request_id, state = %BridgeState::KeyAcquired, "Key assigned");
    debug!(request_id = %request_id, state = %BridgeState::AwaitingSetup, "Waiting for setup frame");

    // The upstream leg is only dialed once the client has sent its setup
    // frame. Anything else arriving before that is dropped.
    let session = loop {
        let msg = match socket.recv().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(request_id = %request_id, error = %e, "Client socket error before setup");
                return;
            }
            None => return,
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Setup(setup)) => {
                    let upstream_setup = setup.into_upstream(&state.config.default_model);
                    match state.live.connect(&key, &upstream_setup).await {
                        Ok(session) => {
                            state.keys.report_success(&key);
                            if socket
                                .send(Message::Text(ServerFrame::Open.encode()))
                                .await
                                .is_err()
                            {
                                return;
                            }
                            info!(
                                request_id = %request_id,
                                state = %BridgeState::Bridged,
                                "Upstream session established"
                            );
                            break session;
                        }
                        Err(e) => {
                            state.keys.report_failure(&key);
                            error!(request_id = %request_id, error = %e, "Upstream session failed");
                            close_socket(socket, e.close_code(), e.to_string()).await;
                            return;
                        }
                    }
                }
                Ok(_) => {
                    warn!(request_id = %request_id, "Data frame before setup, dropping");
                }
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Malformed client frame, dropping");
                }
            },
            Message::Binary(_) => {
                warn!(request_id = %request_id, "Binary frame before setup, dropping");
            }
            Message::Close(_) => return,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    };

    bridge_frames(state, request_id, &key, socket, session).await;
}

/// Pump frames between the client socket and the upstream session.
async fn bridge_frames(
    state: &AppState,
    request_id: &str,
    key: &SecretString,
    mut socket: WebSocket,
    mut session: LiveSession,
) {
    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::Setup(_)) => {
                        debug!(request_id = %request_id, "Duplicate setup frame ignored");
                    }
                    Ok(_) => {
                        // Forward the original text so upstream sees the
                        // frame byte for byte.
                        if session.send(LiveFrame::Text(text)).await.is_err() {
                            close_socket(socket, close_code::ERROR, "upstream session lost").await;
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(request_id = %request_id, error = %e, "Malformed client frame, dropping");
                    }
                },
                Some(Ok(Message::Binary(data))) => {
                    if session.send(LiveFrame::Binary(data)).await.is_err() {
                        close_socket(socket, close_code::ERROR, "upstream session lost").await;
                        return;
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                // Dropping the session tears down the upstream leg.
                Some(Ok(Message::Close(_))) | None => return,
                Some(Err(e)) => {
                    debug!(request_id = %request_id, error = %e, "Client socket error");
                    return;
                }
            },
            event = session.next_event() => match event {
                Some(LiveEvent::Text(raw)) => {
                    if socket
                        .send(Message::Text(ServerFrame::UpstreamEvent(raw).encode()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Some(LiveEvent::Binary(data)) => {
                    if socket.send(Message::Binary(data)).await.is_err() {
                        return;
                    }
                }
                Some(LiveEvent::Closed { code, reason }) => {
                    debug!(
                        request_id = %request_id,
                        code = ?code,
                        reason = %reason,
                        "Upstream closed session"
                    );
                    close_socket(socket, close_code::NORMAL, "").await;
                    return;
                }
                Some(LiveEvent::Error(e)) => {
                    state.keys.report_failure(key);
                    error!(request_id = %request_id, error = %e, "Upstream session error");
                    close_socket(socket, close_code::ERROR, e.to_string()).await;
                    return;
                }
                None => {
                    close_socket(socket, close_code::NORMAL, "").await;
                    return;
                }
            },
        }
    }
}

async fn close_socket(mut socket: WebSocket, code: u16, reason: impl Into<Cow<'static, str>>) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}
