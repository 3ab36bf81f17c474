//! Live payout event stream.
//!
//! One WebSocket endpoint fans out every [`PayoutEvent`] as a JSON text
//! frame. Frames are advisory: a consumer that misses some (slow reader,
//! reconnect) refetches through the REST listing instead of replaying.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::PayoutEvent;
use crate::interfaces::http::handlers::AppState;

pub async fn events(
    State(state): State<Arc<AppState>>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.notifier.subscribe();
    upgrade.on_upgrade(move |socket| stream_events(socket, rx))
}

async fn stream_events(mut socket: WebSocket, mut rx: broadcast::Receiver<PayoutEvent>) {
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "dropping unserializable event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                // A lagged reader skips ahead; the stream carries no state,
                // so there is nothing to repair.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event consumer lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                // Inbound frames are ignored, the stream is one-way.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "websocket read error, closing");
                    break;
                }
            },
        }
    }
}
