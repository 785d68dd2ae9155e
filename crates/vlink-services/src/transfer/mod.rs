//! Chunked file transfer over an established peer channel.
//!
//! The sender announces the file on the text lane, streams fixed-size chunks
//! on the binary lane while honouring the channel's buffered-amount signal,
//! then marks the end on the text lane. Chunks carry no sequence number and
//! rely on the channel delivering in order.

pub mod channel;
mod receive;
mod send;

pub use channel::{ChannelError, Frame, MemoryChannel, PeerChannel};
pub use receive::{ReceiveEvent, ReceivedFile, TransferReceiver};
pub use send::{FileSource, TransferSender};

use vlink_core::config::{TransferSettings, DEFAULT_CHUNK_SIZE};
use vlink_core::wire::WireError;

use crate::progress::Progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sending,
    Receiving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    MetadataSent,
    Streaming,
    /// Receiver side, between metadata and completion.
    Receiving,
    Complete,
    Aborted,
}

/// Byte accounting for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    pub direction: Direction,
    pub file_name: String,
    pub total_size: u64,
    pub transferred: u64,
    pub state: TransferState,
}

impl TransferSession {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            file_name: String::new(),
            total_size: 0,
            transferred: 0,
            state: TransferState::Idle,
        }
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.transferred, self.total_size)
    }

    /// Mid-transfer states, the ones a closing channel aborts.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            TransferState::MetadataSent | TransferState::Streaming | TransferState::Receiving
        )
    }

    /// Status line for display.
    pub fn status_text(&self) -> String {
        match self.state {
            TransferState::Idle => "idle".to_string(),
            TransferState::MetadataSent | TransferState::Streaming => {
                format!("sending {}: {}", self.file_name, self.progress())
            }
            TransferState::Receiving => {
                format!("receiving {}: {}", self.file_name, self.progress())
            }
            TransferState::Complete => format!("complete: {}", self.file_name),
            TransferState::Aborted => "disconnected".to_string(),
        }
    }
}

/// Chunk budget and water marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControl {
    pub chunk_size: usize,
    pub high_water_mark: usize,
    pub low_water_mark: usize,
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::from(&TransferSettings::default())
    }
}

impl From<&TransferSettings> for FlowControl {
    fn from(s: &TransferSettings) -> Self {
        Self {
            chunk_size: if s.chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                s.chunk_size
            },
            high_water_mark: s.high_water_mark,
            low_water_mark: s.low_water_mark.min(s.high_water_mark),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("peer channel is not open")]
    ChannelNotOpen,
    #[error("a transfer is already running on this sender")]
    Busy,
    #[error("peer channel lost: {0}")]
    Disconnected(#[from] ChannelError),
    #[error("source ended after {read} of {expected} bytes")]
    SourceTruncated { expected: u64, read: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("received {received} bytes but {announced} were announced")]
    SizeMismatch { announced: u64, received: u64 },
    #[error("bad control message: {0}")]
    Protocol(#[from] WireError),
}
