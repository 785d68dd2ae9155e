//! vlink-core: shared wire types, configuration, and catalog entries.
//! All other vlink crates depend on this one.

pub mod config;
pub mod files;
pub mod wire;

pub use files::{sanitize_filename, FileDescriptor};
pub use wire::{ClientMessage, Inbound, Outbound, PeerControl, PeerId, ServerMessage, Signal, SignalKind};
