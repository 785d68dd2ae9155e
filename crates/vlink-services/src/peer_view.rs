//! Client-side view of the rendezvous state, rebuilt from server messages.

use std::collections::BTreeSet;

use vlink_core::{FileDescriptor, PeerId, ServerMessage};

/// What applying a message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    Identified(PeerId),
    PeersReplaced,
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    FilesReplaced,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerView {
    self_id: Option<PeerId>,
    peers: BTreeSet<PeerId>,
    files: Vec<FileDescriptor>,
}

impl PeerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, msg: &ServerMessage) -> ViewChange {
        match msg {
            ServerMessage::Id { id } => {
                self.self_id = Some(id.clone());
                self.peers.remove(id);
                ViewChange::Identified(id.clone())
            }
            ServerMessage::PeersList { peers } => {
                self.peers = peers
                    .iter()
                    .filter(|p| Some(*p) != self.self_id.as_ref())
                    .cloned()
                    .collect();
                ViewChange::PeersReplaced
            }
            ServerMessage::PeerConnected { id } => {
                if Some(id) == self.self_id.as_ref() || !self.peers.insert(id.clone()) {
                    return ViewChange::Unchanged;
                }
                ViewChange::PeerJoined(id.clone())
            }
            ServerMessage::PeerDisconnected { id } => {
                if self.peers.remove(id) {
                    ViewChange::PeerLeft(id.clone())
                } else {
                    ViewChange::Unchanged
                }
            }
            ServerMessage::FilesList { files } => {
                self.files = files.clone();
                ViewChange::FilesReplaced
            }
        }
    }

    pub fn self_id(&self) -> Option<&PeerId> {
        self.self_id.as_ref()
    }

    pub fn peers(&self) -> &BTreeSet<PeerId> {
        &self.peers
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }
}
