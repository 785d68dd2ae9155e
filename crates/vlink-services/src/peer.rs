//! Peer registry: tracks connected peers and their outbound sinks.
//!
//! The registry is a plain single-owner structure. It is only ever reached
//! through the rendezvous hub, which holds it behind the same lock as the
//! catalog so that membership changes and their broadcasts never interleave.

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::mpsc;

use vlink_core::{Outbound, PeerId};

/// Outbound message sink of a connected peer. Sends never block.
pub type PeerSink = mpsc::UnboundedSender<Outbound>;

/// Length of a generated peer id.
pub const PEER_ID_LEN: usize = 9;

/// Id generation attempts before a connection is refused.
pub const MAX_ID_ATTEMPTS: usize = 16;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A connected peer.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    sink: PeerSink,
}

impl Peer {
    /// Fire-and-forget delivery. Returns false if the peer's writer is gone.
    pub fn send(&self, msg: impl Into<Outbound>) -> bool {
        self.sink.send(msg.into()).is_ok()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no free peer id after {0} attempts")]
    IdSpaceExhausted(usize),
}

type IdSource = Box<dyn FnMut() -> String + Send>;

/// Connected peers keyed by id. Every key equals its value's `id`.
pub struct PeerRegistry {
    peers: HashMap<PeerId, Peer>,
    id_source: IdSource,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::with_id_source(random_id)
    }

    /// Registry drawing candidate ids from `source`. Candidates are still
    /// checked against live ids, so a poor source only costs retries.
    pub fn with_id_source(source: impl FnMut() -> String + Send + 'static) -> Self {
        Self {
            peers: HashMap::new(),
            id_source: Box::new(source),
        }
    }

    /// Allocate a fresh id for `sink` and insert the peer.
    pub fn register(&mut self, sink: PeerSink) -> Result<PeerId, RegistryError> {
        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = PeerId::new((self.id_source)());
            if id.as_str().is_empty() || self.peers.contains_key(&id) {
                tracing::debug!(attempt, candidate = %id, "peer id collision, retrying");
                continue;
            }
            self.peers.insert(
                id.clone(),
                Peer {
                    id: id.clone(),
                    sink,
                },
            );
            return Ok(id);
        }
        Err(RegistryError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
    }

    /// Remove a peer. No-op (returns None) if the id is absent.
    pub fn unregister(&mut self, id: &PeerId) -> Option<Peer> {
        self.peers.remove(id)
    }

    pub fn lookup(&self, id: &PeerId) -> Option<&Peer> {
        self.peers.get(id)
    }

    /// Ids of every peer but `id`, sorted.
    pub fn all_except(&self, id: &PeerId) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.keys().filter(|k| *k != id).cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Random lowercase base-36 id.
fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..PEER_ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
