use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;

use vlink_core::PeerControl;

use super::channel::PeerChannel;
use super::{Direction, FlowControl, TransferError, TransferSession, TransferState};

/// A file to send: its announced metadata plus a reader for its bytes.
pub struct FileSource<R> {
    pub name: String,
    pub size: u64,
    pub file_type: String,
    reader: R,
}

impl FileSource<tokio::fs::File> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self::from_reader(name, size, file_type, file))
    }
}

impl<R: AsyncRead + Unpin + Send> FileSource<R> {
    pub fn from_reader(
        name: impl Into<String>,
        size: u64,
        file_type: impl Into<String>,
        reader: R,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            file_type: file_type.into(),
            reader,
        }
    }
}

/// Sending half of a transfer. Session state is published on a watch
/// channel so a UI can follow progress.
///
/// At most one `send` runs at a time; a second concurrent call fails with
/// `TransferError::Busy` and leaves the running session untouched.
pub struct TransferSender {
    flow: FlowControl,
    status: watch::Sender<TransferSession>,
    busy: AtomicBool,
}

/// Clears the busy flag when a send finishes or its future is dropped.
struct SendSlot<'a>(&'a AtomicBool);

impl Drop for SendSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TransferSender {
    pub fn new(flow: FlowControl) -> Self {
        let (status, _) = watch::channel(TransferSession::new(Direction::Sending));
        Self {
            flow,
            status,
            busy: AtomicBool::new(false),
        }
    }

    fn claim(&self) -> Option<SendSlot<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SendSlot(&self.busy))
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferSession> {
        self.status.subscribe()
    }

    pub fn session(&self) -> TransferSession {
        self.status.borrow().clone()
    }

    /// Stream `source` over `channel`. Any channel failure aborts the session;
    /// nothing is retried.
    pub async fn send<R, C>(
        &self,
        source: FileSource<R>,
        channel: &C,
    ) -> Result<TransferSession, TransferError>
    where
        R: AsyncRead + Unpin + Send,
        C: PeerChannel + ?Sized,
    {
        let Some(_slot) = self.claim() else {
            tracing::warn!(file = %source.name, "sender busy, refusing second transfer");
            return Err(TransferError::Busy);
        };
        match self.stream(source, channel).await {
            Ok(()) => Ok(self.session()),
            Err(e) => {
                self.status.send_modify(|s| s.state = TransferState::Aborted);
                let session = self.session();
                tracing::warn!(
                    file = %session.file_name,
                    sent = session.transferred,
                    total = session.total_size,
                    error = %e,
                    "transfer aborted"
                );
                Err(e)
            }
        }
    }

    async fn stream<R, C>(&self, source: FileSource<R>, channel: &C) -> Result<(), TransferError>
    where
        R: AsyncRead + Unpin + Send,
        C: PeerChannel + ?Sized,
    {
        if !channel.is_open() {
            return Err(TransferError::ChannelNotOpen);
        }
        let FileSource {
            name,
            size,
            file_type,
            mut reader,
        } = source;

        self.status.send_replace(TransferSession {
            direction: Direction::Sending,
            file_name: name.clone(),
            total_size: size,
            transferred: 0,
            state: TransferState::Idle,
        });

        let metadata = PeerControl::FileMetadata {
            name: name.clone(),
            size,
            file_type,
        };
        channel.send_text(metadata.to_text()?).await?;
        self.status.send_modify(|s| s.state = TransferState::MetadataSent);
        tracing::info!(file = %name, size, "transfer started");

        self.status.send_modify(|s| s.state = TransferState::Streaming);
        let mut sent: u64 = 0;
        while sent < size {
            if channel.buffered_amount() > self.flow.high_water_mark {
                tracing::debug!(
                    buffered = channel.buffered_amount(),
                    low = self.flow.low_water_mark,
                    "channel above high-water mark, pausing"
                );
                channel.wait_buffered_below(self.flow.low_water_mark).await?;
            }

            let len = (size - sent).min(self.flow.chunk_size as u64) as usize;
            let mut chunk = BytesMut::zeroed(len);
            reader.read_exact(&mut chunk).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    TransferError::SourceTruncated {
                        expected: size,
                        read: sent,
                    }
                } else {
                    TransferError::Io(e)
                }
            })?;
            channel.send_binary(chunk.freeze()).await?;

            sent += len as u64;
            self.status.send_modify(|s| s.transferred = sent);
            tokio::task::yield_now().await;
        }

        channel.send_text(PeerControl::FileComplete.to_text()?).await?;
        self.status.send_modify(|s| s.state = TransferState::Complete);
        tracing::info!(file = %name, bytes = sent, "transfer complete");
        Ok(())
    }
}
