//! Real-time block stream.
//!
//! # Data Flow
//! ```text
//! BlockRelay → ChainBlockPublisher ──broadcast──→ socket task ──text frame──→ Client
//! ```
//!
//! # Design Decisions
//! - The subscription is taken before the upgrade completes
//! - A lagging client skips missed events and keeps streaming
//! - Inbound frames are ignored apart from close

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::http::server::AppState;
use crate::relay::ChainBlockEvent;

pub async fn socket_handler(ws: WebSocketUpgrade, State(ctx): State<AppState>) -> Response {
    let events = ctx.publisher().subscribe();
    let shutdown = ctx.shutdown.subscribe();
    ws.on_upgrade(move |socket| stream_blocks(socket, events, shutdown))
}

async fn stream_blocks(
    socket: WebSocket,
    mut events: broadcast::Receiver<Arc<ChainBlockEvent>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!("Socket listener connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let frame = match event.to_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::error!(block = event.number, error = %e, "Failed to encode block event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Socket listener lagging, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = shutdown.recv() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    tracing::debug!("Socket listener disconnected");
}
