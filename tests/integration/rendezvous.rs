use std::collections::BTreeSet;

use serde_json::json;
use vlink_core::{FileDescriptor, PeerId, ServerMessage, SignalKind};
use vlink_services::{
    Dispatch, DropReason, FileCatalog, Negotiation, NegotiationEvent, NegotiationState, Rendezvous,
};

use crate::*;

fn hub() -> Rendezvous {
    Rendezvous::new(FileCatalog::new(), None)
}

/// Every live peer's view equals the registry minus itself.
async fn assert_views_consistent(hub: &Rendezvous, peers: &mut [TestPeer]) {
    let members: BTreeSet<PeerId> = hub.peer_ids().await.into_iter().collect();
    for peer in peers.iter_mut() {
        peer.pump();
        let mut expected = members.clone();
        expected.remove(peer.conn.id());
        assert_eq!(
            peer.view.peers(),
            &expected,
            "view of {} diverged",
            peer.conn.id()
        );
        assert_eq!(peer.view.self_id(), Some(peer.conn.id()));
    }
}

#[tokio::test]
async fn test_views_track_membership_through_churn() {
    let hub = hub();
    let mut peers: Vec<TestPeer> = Vec::new();

    // Deterministic join/leave schedule: true joins, false removes peers[idx % len].
    let schedule = [
        (true, 0),
        (true, 0),
        (true, 0),
        (false, 1),
        (true, 0),
        (false, 0),
        (true, 0),
        (true, 0),
        (false, 2),
        (false, 0),
        (true, 0),
        (false, 5),
    ];

    for (join, idx) in schedule {
        if join {
            peers.push(TestPeer::join(&hub).await);
        } else if !peers.is_empty() {
            let mut gone = peers.remove(idx % peers.len());
            assert!(gone.conn.close().await);
        }
        assert_views_consistent(&hub, &mut peers).await;
    }
}

#[tokio::test]
async fn test_repeat_disconnect_broadcasts_once() {
    let hub = hub();
    let mut a = TestPeer::join(&hub).await;
    let mut b = TestPeer::join(&hub).await;
    a.pump();

    let b_id = b.conn.id().clone();
    assert!(b.conn.close().await);
    assert!(!b.conn.close().await);
    assert!(!hub.disconnect(&b_id).await);

    let seen = a.pump();
    assert_eq!(seen, vec![ServerMessage::PeerDisconnected { id: b_id }]);
}

#[tokio::test]
async fn test_unknown_target_is_dropped_silently() {
    let hub = hub();
    let mut a = TestPeer::join(&hub).await;
    let mut b = TestPeer::join(&hub).await;
    let mut c = TestPeer::join(&hub).await;
    a.pump();
    b.pump();

    let out = a
        .conn
        .handle_text(r#"{"type":"offer","target":"no-such-peer","offer":{"sdp":"v=0"}}"#)
        .await;
    assert_eq!(out, Dispatch::Dropped(DropReason::UnknownTarget));

    for peer in [&mut a, &mut b, &mut c] {
        assert!(peer.pump().is_empty());
        assert!(peer.relayed.is_empty());
    }
}

#[tokio::test]
async fn test_catalog_update_reaches_every_peer() {
    let hub = hub();
    let mut peers = vec![
        TestPeer::join(&hub).await,
        TestPeer::join(&hub).await,
        TestPeer::join(&hub).await,
    ];
    for p in peers.iter_mut() {
        p.pump();
        assert!(p.view.files().is_empty());
    }

    let out = peers[0]
        .conn
        .handle_text(r#"{"type":"update-files","files":[{"name":"a.mp4","size":100}]}"#)
        .await;
    assert_eq!(out, Dispatch::CatalogReplaced(1));

    for p in peers.iter_mut() {
        let seen = p.pump();
        assert_eq!(
            seen,
            vec![ServerMessage::FilesList {
                files: vec![FileDescriptor::new("a.mp4", 100)]
            }]
        );
        assert_eq!(p.view.files(), &[FileDescriptor::new("a.mp4", 100)]);
    }

    // Late joiners get the catalog in their greeting.
    let late = TestPeer::join(&hub).await;
    assert_eq!(late.view.files().len(), 1);
}

/// Two peers negotiate through the hub, each tracking the exchange.
#[tokio::test]
async fn test_negotiation_through_relay() {
    let hub = hub();
    let mut alice = TestPeer::join(&hub).await;
    let mut bob = TestPeer::join(&hub).await;
    alice.pump();

    let alice_id = alice.conn.id().clone();
    let bob_id = bob.conn.id().clone();
    let mut alice_n = Negotiation::new(bob_id.clone());
    let mut bob_n = Negotiation::new(alice_id.clone());

    // Deliver whatever is queued for `peer` into its negotiation.
    fn deliver(peer: &mut TestPeer, n: &mut Negotiation) -> usize {
        peer.pump();
        let relayed = std::mem::take(&mut peer.relayed);
        for body in &relayed {
            let from = PeerId::from(body["from"].as_str().unwrap());
            let kind = SignalKind::from(body["type"].as_str().unwrap());
            n.on_signal(&from, &kind).unwrap();
        }
        relayed.len()
    }

    alice_n.apply(NegotiationEvent::LocalOffer).unwrap();
    let offer = json!({"type": "offer", "target": bob_id.as_str(), "offer": {"sdp": "o"}});
    assert_eq!(alice.conn.handle_text(&offer.to_string()).await, Dispatch::Relayed);
    assert_eq!(deliver(&mut bob, &mut bob_n), 1);
    assert_eq!(bob_n.state(), NegotiationState::OfferReceived);

    bob_n.apply(NegotiationEvent::LocalAnswer).unwrap();
    let answer = json!({"type": "answer", "target": alice_id.as_str(), "answer": {"sdp": "a"}});
    bob.conn.handle_text(&answer.to_string()).await;
    for i in 0..2 {
        bob_n.apply(NegotiationEvent::LocalCandidate).unwrap();
        let cand = json!({"type": "candidate", "target": alice_id.as_str(), "candidate": {"n": i}});
        bob.conn.handle_text(&cand.to_string()).await;
    }
    assert_eq!(deliver(&mut alice, &mut alice_n), 3);
    assert_eq!(alice_n.state(), NegotiationState::AnswerExchanged);

    alice_n.apply(NegotiationEvent::ChannelOpened).unwrap();
    bob_n.apply(NegotiationEvent::ChannelOpened).unwrap();
    assert!(alice_n.is_open() && bob_n.is_open());

    // A spoofed `from` on the wire is overwritten by the server.
    let spoof = json!({"type": "offer", "target": alice_id.as_str(), "from": "mallory", "offer": {}});
    bob.conn.handle_text(&spoof.to_string()).await;
    alice.pump();
    assert_eq!(alice.relayed[0]["from"], json!(bob_id.as_str()));

    // Bob leaving closes alice's negotiation.
    assert!(bob.conn.close().await);
    for msg in alice.pump() {
        if let ServerMessage::PeerDisconnected { id } = msg {
            alice_n.on_peer_disconnected(&id);
        }
    }
    assert_eq!(alice_n.state(), NegotiationState::Closed);
}
