use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bloodlink_sdk::objects::RealtimeFrame;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// `GET /ws`: real-time event stream.
///
/// Upgrades the HTTP connection to a WebSocket and pushes one
/// [`RealtimeFrame`] JSON text frame per broadcast. Incoming client frames
/// are ignored apart from close.
pub async fn realtime_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let frames = state.hub.subscribe();
    ws.on_upgrade(move |socket| relay_frames(socket, frames))
}

/// Background task that drives a single WebSocket connection until the
/// client disconnects or the hub shuts down.
async fn relay_frames(
    mut socket: WebSocket,
    mut frames: tokio::sync::broadcast::Receiver<RealtimeFrame>,
) {
    tracing::debug!("WS: client connected");
    loop {
        tokio::select! {
            result = frames.recv() => {
                match result {
                    Ok(frame) => {
                        if send_json(&mut socket, &frame).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WS: client lagged, frames dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        tracing::debug!("WS: client disconnected");
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
