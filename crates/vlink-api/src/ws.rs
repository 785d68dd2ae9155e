//! WebSocket bridge between a socket and its rendezvous `Connection`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use vlink_core::Outbound;
use vlink_services::{Connection, Rendezvous};

pub fn upgrade(ws: WebSocketUpgrade, hub: Rendezvous) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Rendezvous) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let mut conn = match Connection::open(hub, tx).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "refusing websocket connection");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            biased;
            Some(msg) = rx.recv() => {
                let text = match msg.to_text() {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(peer = %conn.id(), error = %e, "failed to encode outbound message");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        conn.handle_text(text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!(peer = %conn.id(), bytes = data.len(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %conn.id(), error = %e, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    conn.close().await;
}
