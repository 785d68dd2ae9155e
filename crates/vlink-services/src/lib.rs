pub mod catalog;
pub mod negotiation;
pub mod peer;
pub mod peer_view;
pub mod progress;
pub mod rendezvous;
pub mod router;
pub mod transfer;

pub use catalog::{CatalogError, FileCatalog};
pub use negotiation::{Negotiation, NegotiationError, NegotiationEvent, NegotiationState};
pub use peer::{Peer, PeerRegistry, PeerSink, RegistryError};
pub use peer_view::{PeerView, ViewChange};
pub use progress::{format_size, Progress};
pub use rendezvous::{RelayOutcome, Rendezvous};
pub use router::{Connection, Dispatch, DropReason};
pub use transfer::{
    ChannelError, Direction, FileSource, FlowControl, Frame, MemoryChannel, PeerChannel,
    ReceiveEvent, ReceivedFile, TransferError, TransferReceiver, TransferSender, TransferSession,
    TransferState,
};
