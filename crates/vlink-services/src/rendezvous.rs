//! Rendezvous hub: peer registry and file catalog behind a single lock.
//!
//! Every mutation and the broadcast it triggers happen inside one critical
//! section, so no peer can observe a membership or catalog view that is
//! stale with respect to a notification it has already been sent. Sends are
//! unbounded-channel pushes and never wait on the receiving peer.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use vlink_core::{FileDescriptor, PeerId, ServerMessage, Signal};

use crate::catalog::{CatalogError, FileCatalog};
use crate::peer::{PeerRegistry, PeerSink, RegistryError};

/// Result of relaying a directed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    /// Target not registered. The sender is not told.
    UnknownTarget,
    /// Target registered but its writer already went away.
    TargetClosed,
}

struct HubState {
    registry: PeerRegistry,
    catalog: FileCatalog,
}

/// Shared handle to the hub. Cheap to clone.
#[derive(Clone)]
pub struct Rendezvous {
    inner: Arc<Mutex<HubState>>,
    control_token: Arc<Option<String>>,
}

impl Rendezvous {
    pub fn new(catalog: FileCatalog, control_token: Option<String>) -> Self {
        Self::with_registry(PeerRegistry::new(), catalog, control_token)
    }

    pub fn with_registry(
        registry: PeerRegistry,
        catalog: FileCatalog,
        control_token: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubState { registry, catalog })),
            control_token: Arc::new(control_token),
        }
    }

    /// Register a new connection.
    ///
    /// The new peer receives, in order: its `id`, the `peers-list` of everyone
    /// else, and the current `files-list`. Every other peer then receives
    /// `peer-connected`. All of it happens before the lock is released.
    pub async fn connect(&self, sink: PeerSink) -> Result<PeerId, RegistryError> {
        let mut state = self.inner.lock().await;
        let id = state.registry.register(sink)?;

        let others = state.registry.all_except(&id);
        let files = state.catalog.snapshot();
        if let Some(peer) = state.registry.lookup(&id) {
            peer.send(ServerMessage::Id { id: id.clone() });
            peer.send(ServerMessage::PeersList {
                peers: others.clone(),
            });
            peer.send(ServerMessage::FilesList { files });
        }

        for other in state.registry.iter().filter(|p| p.id != id) {
            other.send(ServerMessage::PeerConnected { id: id.clone() });
        }

        tracing::info!(peer = %id, peers = state.registry.len(), "peer connected");
        Ok(id)
    }

    /// Remove a peer and tell everyone left. Returns false, and sends
    /// nothing, if the peer was already gone.
    pub async fn disconnect(&self, id: &PeerId) -> bool {
        let mut state = self.inner.lock().await;
        if state.registry.unregister(id).is_none() {
            return false;
        }
        for other in state.registry.iter() {
            other.send(ServerMessage::PeerDisconnected { id: id.clone() });
        }
        tracing::info!(peer = %id, peers = state.registry.len(), "peer disconnected");
        true
    }

    /// Forward a directed message to its target, stamping `from`.
    pub async fn relay(&self, from: &PeerId, signal: Signal) -> RelayOutcome {
        let state = self.inner.lock().await;
        let target = signal.target.clone();
        let kind = signal.kind.as_str().to_string();
        match state.registry.lookup(&target) {
            Some(peer) => {
                if peer.send(signal.stamp(from)) {
                    tracing::debug!(%from, %target, kind = %kind, "signal relayed");
                    RelayOutcome::Delivered
                } else {
                    tracing::debug!(%from, %target, kind = %kind, "signal target writer closed");
                    RelayOutcome::TargetClosed
                }
            }
            None => {
                tracing::debug!(%from, %target, kind = %kind, "signal target not found, dropped");
                RelayOutcome::UnknownTarget
            }
        }
    }

    /// Check a presented token against the configured control token.
    pub fn authorize(&self, token: Option<&str>) -> bool {
        match self.control_token.as_deref() {
            None => true,
            Some(expected) => token == Some(expected),
        }
    }

    /// Replace the catalog and broadcast it to every registered peer.
    pub async fn replace_catalog(
        &self,
        files: Vec<FileDescriptor>,
        token: Option<&str>,
    ) -> Result<usize, CatalogError> {
        if !self.authorize(token) {
            return Err(CatalogError::Unauthorized);
        }
        let mut state = self.inner.lock().await;
        state.catalog.replace(files);
        // Persisted before anyone is told about the new catalog.
        state.catalog.persist().await;
        let snapshot = state.catalog.snapshot();
        let count = snapshot.len();
        for peer in state.registry.iter() {
            peer.send(ServerMessage::FilesList {
                files: snapshot.clone(),
            });
        }
        tracing::info!(files = count, peers = state.registry.len(), "catalog replaced");
        Ok(count)
    }

    pub async fn catalog(&self) -> Vec<FileDescriptor> {
        self.inner.lock().await.catalog.snapshot()
    }

    /// Resolve a catalog index to its descriptor and backing path.
    pub async fn locate(&self, index: usize) -> Result<(FileDescriptor, PathBuf), CatalogError> {
        self.inner.lock().await.catalog.locate(index)
    }

    /// Ids of every connected peer, sorted.
    pub async fn peer_ids(&self) -> Vec<PeerId> {
        let state = self.inner.lock().await;
        let mut ids: Vec<PeerId> = state.registry.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        ids
    }

    /// (connected peers, catalog entries)
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.inner.lock().await;
        (state.registry.len(), state.catalog.len())
    }
}
