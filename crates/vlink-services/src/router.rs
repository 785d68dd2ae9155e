//! Per-connection message routing.
//!
//! A `Connection` is created when a socket is accepted and lives until the
//! socket goes away. Inbound text frames are parsed and dispatched against the
//! shared hub; nothing is ever sent back to the originator as an error.

use vlink_core::{ClientMessage, PeerId};

use crate::peer::{PeerSink, RegistryError};
use crate::rendezvous::{RelayOutcome, Rendezvous};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Catalog replaced; carries the new entry count.
    CatalogReplaced(usize),
    Relayed,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Malformed,
    Unauthorized,
    UnknownTarget,
    /// Message arrived after the connection was closed.
    Closed,
}

/// Router state for one live connection.
pub struct Connection {
    id: PeerId,
    hub: Rendezvous,
    closed: bool,
}

impl Connection {
    /// Register with the hub. The peer gets its greeting before this returns.
    pub async fn open(hub: Rendezvous, sink: PeerSink) -> Result<Self, RegistryError> {
        let id = hub.connect(sink).await?;
        Ok(Self {
            id,
            hub,
            closed: false,
        })
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Parse and dispatch one text frame.
    pub async fn handle_text(&self, text: &str) -> Dispatch {
        if self.closed {
            return Dispatch::Dropped(DropReason::Closed);
        }
        let msg = match ClientMessage::parse(text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(peer = %self.id, error = %e, "dropping malformed message");
                return Dispatch::Dropped(DropReason::Malformed);
            }
        };

        match msg {
            ClientMessage::UpdateFiles { files, token } => {
                match self.hub.replace_catalog(files, token.as_deref()).await {
                    Ok(count) => Dispatch::CatalogReplaced(count),
                    Err(e) => {
                        tracing::warn!(peer = %self.id, error = %e, "dropping catalog update");
                        Dispatch::Dropped(DropReason::Unauthorized)
                    }
                }
            }
            ClientMessage::Signal(signal) => match self.hub.relay(&self.id, signal).await {
                RelayOutcome::Delivered => Dispatch::Relayed,
                RelayOutcome::UnknownTarget | RelayOutcome::TargetClosed => {
                    Dispatch::Dropped(DropReason::UnknownTarget)
                }
            },
        }
    }

    /// Run the disconnect path. Only the first call does anything.
    pub async fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.hub.disconnect(&self.id).await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Socket task ended without reaching close(), e.g. aborted on shutdown.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let hub = self.hub.clone();
            let id = self.id.clone();
            handle.spawn(async move {
                hub.disconnect(&id).await;
            });
        }
    }
}
