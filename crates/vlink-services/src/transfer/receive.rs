use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tokio::sync::watch;

use vlink_core::{sanitize_filename, PeerControl};

use super::channel::{ChannelError, Frame, PeerChannel};
use super::{Direction, TransferError, TransferSession, TransferState};
use crate::progress::Progress;

/// A fully reassembled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub file_type: String,
    pub data: Bytes,
}

impl ReceivedFile {
    /// Write into `dir` under the sanitized name. Returns the written path.
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf, TransferError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(sanitize_filename(&self.name));
        tokio::fs::write(&path, &self.data).await?;
        tracing::info!(path = %path.display(), bytes = self.data.len(), "saved received file");
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    Started { name: String, size: u64 },
    Progress(Progress),
    Completed(ReceivedFile),
    /// Frame had no effect (no transfer active, or unreadable control text).
    Ignored,
}

/// Receiving half of a transfer. Reusable: each `file-metadata` starts a new
/// session.
pub struct TransferReceiver {
    file_type: String,
    chunks: Vec<Bytes>,
    status: watch::Sender<TransferSession>,
}

impl Default for TransferReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferReceiver {
    pub fn new() -> Self {
        let (status, _) = watch::channel(TransferSession::new(Direction::Receiving));
        Self {
            file_type: String::new(),
            chunks: Vec::new(),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferSession> {
        self.status.subscribe()
    }

    pub fn session(&self) -> TransferSession {
        self.status.borrow().clone()
    }

    /// Chunks held for the current session.
    pub fn buffered_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn handle_frame(&mut self, frame: Frame) -> Result<ReceiveEvent, TransferError> {
        match frame {
            Frame::Text(text) => match PeerControl::parse(&text) {
                Ok(PeerControl::FileMetadata {
                    name,
                    size,
                    file_type,
                }) => Ok(self.start(name, size, file_type)),
                Ok(PeerControl::FileComplete) => self.finish(),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable control message");
                    Ok(ReceiveEvent::Ignored)
                }
            },
            Frame::Binary(data) => self.append(data),
        }
    }

    /// Pull frames until a file completes. A closing channel aborts any
    /// transfer in progress.
    pub async fn run<C: PeerChannel + ?Sized>(
        &mut self,
        channel: &C,
    ) -> Result<ReceivedFile, TransferError> {
        loop {
            let Some(frame) = channel.recv().await else {
                if self.session().is_active() {
                    self.abort("channel closed");
                }
                return Err(TransferError::Disconnected(ChannelError::Closed));
            };
            if let ReceiveEvent::Completed(file) = self.handle_frame(frame)? {
                return Ok(file);
            }
        }
    }

    fn start(&mut self, name: String, size: u64, file_type: String) -> ReceiveEvent {
        self.chunks = Vec::new();
        self.file_type = file_type;
        self.status.send_replace(TransferSession {
            direction: Direction::Receiving,
            file_name: name.clone(),
            total_size: size,
            transferred: 0,
            state: TransferState::Receiving,
        });
        tracing::info!(file = %name, size, "receiving file");
        ReceiveEvent::Started { name, size }
    }

    fn append(&mut self, data: Bytes) -> Result<ReceiveEvent, TransferError> {
        let session = self.session();
        if session.state != TransferState::Receiving {
            tracing::debug!(bytes = data.len(), "dropping chunk outside a transfer");
            return Ok(ReceiveEvent::Ignored);
        }
        let received = session.transferred + data.len() as u64;
        if received > session.total_size {
            self.abort("more bytes than announced");
            return Err(TransferError::SizeMismatch {
                announced: session.total_size,
                received,
            });
        }
        self.chunks.push(data);
        self.status.send_modify(|s| s.transferred = received);
        Ok(ReceiveEvent::Progress(Progress::new(
            received,
            session.total_size,
        )))
    }

    fn finish(&mut self) -> Result<ReceiveEvent, TransferError> {
        let session = self.session();
        if session.state != TransferState::Receiving {
            tracing::debug!("dropping file-complete outside a transfer");
            return Ok(ReceiveEvent::Ignored);
        }
        if session.transferred != session.total_size {
            self.abort("completion before all bytes arrived");
            return Err(TransferError::SizeMismatch {
                announced: session.total_size,
                received: session.transferred,
            });
        }

        let chunks = std::mem::take(&mut self.chunks);
        let mut data = BytesMut::with_capacity(session.total_size as usize);
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }
        self.status.send_modify(|s| s.state = TransferState::Complete);
        tracing::info!(file = %session.file_name, bytes = data.len(), "file received");

        Ok(ReceiveEvent::Completed(ReceivedFile {
            name: session.file_name,
            file_type: std::mem::take(&mut self.file_type),
            data: data.freeze(),
        }))
    }

    fn abort(&mut self, reason: &str) {
        self.chunks = Vec::new();
        self.status.send_modify(|s| s.state = TransferState::Aborted);
        let session = self.session();
        tracing::warn!(
            file = %session.file_name,
            received = session.transferred,
            total = session.total_size,
            reason,
            "receive aborted"
        );
    }
}
