use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use vlink_core::{FileDescriptor, PeerId, Signal, SignalKind};

use crate::*;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(server: &TestServer) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/", server.addr))
        .await
        .expect("websocket handshake");
    ws
}

/// Next text frame as JSON. Control frames are skipped.
async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(_) = &msg {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

async fn send_text(ws: &mut Ws, text: impl Into<String>) {
    ws.send(Message::text(text.into())).await.unwrap();
}

/// Connect and consume the three greeting messages. Returns the assigned id.
async fn join(server: &TestServer) -> (Ws, PeerId) {
    let mut ws = connect(server).await;
    let id = next_json(&mut ws).await;
    assert_eq!(id["type"], "id");
    let id = PeerId::from(id["id"].as_str().unwrap());
    assert_eq!(next_json(&mut ws).await["type"], "peers-list");
    assert_eq!(next_json(&mut ws).await["type"], "files-list");
    (ws, id)
}

fn offer(target: &PeerId, sdp: &str) -> String {
    let mut payload = Map::new();
    payload.insert("offer".into(), json!({ "sdp": sdp }));
    Signal::new(SignalKind::Offer, target.clone(), payload)
        .to_text()
        .unwrap()
}

#[tokio::test]
async fn test_socket_greeting_order_and_join_broadcast() {
    let dir = TempDir::new("ws-greeting");
    let server = TestServer::start(dir.path(), None).await.unwrap();
    server
        .hub
        .replace_catalog(vec![FileDescriptor::new("a.mp4", 100)], None)
        .await
        .unwrap();

    let mut a = connect(&server).await;
    let a_id = next_json(&mut a).await;
    assert_eq!(a_id["type"], "id");
    assert_eq!(a_id["id"].as_str().unwrap().len(), 9);
    assert_eq!(next_json(&mut a).await, json!({"type": "peers-list", "peers": []}));
    assert_eq!(
        next_json(&mut a).await,
        json!({"type": "files-list", "files": [{"name": "a.mp4", "size": 100}]})
    );

    let mut b = connect(&server).await;
    let b_id = next_json(&mut b).await;
    assert_eq!(b_id["type"], "id");
    assert_eq!(
        next_json(&mut b).await,
        json!({"type": "peers-list", "peers": [a_id["id"].clone()]})
    );
    assert_eq!(next_json(&mut b).await["type"], "files-list");

    assert_eq!(
        next_json(&mut a).await,
        json!({"type": "peer-connected", "id": b_id["id"].clone()})
    );
    assert_eq!(server.hub.counts().await, (2, 1));
}

#[tokio::test]
async fn test_socket_relay_stamps_sender_and_drops_bad_input() {
    let dir = TempDir::new("ws-relay");
    let server = TestServer::start(dir.path(), None).await.unwrap();
    let (mut a, a_id) = join(&server).await;
    let (mut b, b_id) = join(&server).await;
    assert_eq!(next_json(&mut a).await["type"], "peer-connected");

    // A spoofed `from` is replaced with the sender's id.
    let spoofed = json!({"type": "offer", "target": b_id.as_str(), "from": "evil", "offer": {"sdp": "s"}});
    send_text(&mut a, spoofed.to_string()).await;
    let relayed = next_json(&mut b).await;
    assert_eq!(
        relayed,
        json!({"type": "offer", "target": b_id.as_str(), "from": a_id.as_str(), "offer": {"sdp": "s"}})
    );

    // Garbage, server-only types and unknown targets get no reply and
    // reach nobody. The marker offer that follows is the next frame each side
    // sees, so anything leaked would show up first.
    send_text(&mut a, "not json").await;
    send_text(&mut a, r#"{"type":"peer-connected","id":"x","target":"y"}"#).await;
    send_text(&mut a, offer(&PeerId::from("no-such-peer"), "lost")).await;
    a.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    send_text(&mut a, offer(&a_id, "marker-a")).await;
    send_text(&mut a, offer(&b_id, "marker-b")).await;

    let to_a = next_json(&mut a).await;
    assert_eq!(to_a["offer"]["sdp"], "marker-a");
    assert_eq!(to_a["from"], json!(a_id.as_str()));
    let to_b = next_json(&mut b).await;
    assert_eq!(to_b["offer"]["sdp"], "marker-b");
    assert_eq!(server.hub.counts().await, (2, 0));
}

#[tokio::test]
async fn test_socket_catalog_update_reaches_every_socket() {
    let dir = TempDir::new("ws-catalog");
    let server = TestServer::start(dir.path(), None).await.unwrap();
    let (mut a, _) = join(&server).await;
    let (mut b, _) = join(&server).await;
    assert_eq!(next_json(&mut a).await["type"], "peer-connected");

    send_text(
        &mut b,
        r#"{"type":"update-files","files":[{"name":"a.mp4","size":100}]}"#,
    )
    .await;
    let expected = json!({"type": "files-list", "files": [{"name": "a.mp4", "size": 100}]});
    assert_eq!(next_json(&mut a).await, expected);
    assert_eq!(next_json(&mut b).await, expected);
}

#[tokio::test]
async fn test_socket_drop_unregisters_and_notifies() {
    let dir = TempDir::new("ws-drop");
    let server = TestServer::start(dir.path(), None).await.unwrap();
    let (mut a, a_id) = join(&server).await;
    let (mut b, _) = join(&server).await;
    assert_eq!(next_json(&mut a).await["type"], "peer-connected");

    drop(a);
    assert_eq!(
        next_json(&mut b).await,
        json!({"type": "peer-disconnected", "id": a_id.as_str()})
    );
    assert_eq!(server.hub.counts().await, (1, 0));

    // A clean close frame takes the same path.
    b.close(None).await.unwrap();
    for _ in 0..50 {
        if server.hub.counts().await.0 == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.hub.counts().await, (0, 0));
}
