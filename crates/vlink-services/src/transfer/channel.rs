//! Established peer-to-peer channel: an ordered, reliable duplex with a text
//! lane for control messages and a binary lane for chunks.
//!
//! The real transport lives outside this crate. `MemoryChannel` is an
//! in-process pair used by tests and local loopback.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(t) => t.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("peer channel closed")]
    Closed,
}

#[async_trait]
pub trait PeerChannel: Send + Sync {
    fn is_open(&self) -> bool;

    async fn send_text(&self, text: String) -> Result<(), ChannelError>;

    async fn send_binary(&self, data: Bytes) -> Result<(), ChannelError>;

    /// Next frame from the remote end. None once the channel is closed.
    async fn recv(&self) -> Option<Frame>;

    /// Bytes accepted by `send_*` that the remote has not consumed yet.
    fn buffered_amount(&self) -> usize;

    /// Resolve once `buffered_amount() <= low`. Fails if the channel closes
    /// while waiting.
    async fn wait_buffered_below(&self, low: usize) -> Result<(), ChannelError>;

    /// Close both directions. Idempotent.
    fn close(&self);
}

// ── In-memory pair ────────────────────────────────────────────────────────────

#[derive(Default)]
struct PipeState {
    frames: VecDeque<Frame>,
    buffered: usize,
}

/// One direction of the link.
#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    changed: Notify,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct Link {
    pipes: [Pipe; 2],
    closed: AtomicBool,
}

/// One end of an in-memory channel. Dropping an end closes the channel.
pub struct MemoryChannel {
    link: Arc<Link>,
    side: usize,
}

impl MemoryChannel {
    /// Two connected ends.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let link = Arc::new(Link::default());
        (
            MemoryChannel {
                link: link.clone(),
                side: 0,
            },
            MemoryChannel { link, side: 1 },
        )
    }

    fn outbound(&self) -> &Pipe {
        &self.link.pipes[self.side]
    }

    fn inbound(&self) -> &Pipe {
        &self.link.pipes[1 - self.side]
    }

    fn push(&self, frame: Frame) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        let pipe = self.outbound();
        {
            let mut state = pipe.lock();
            state.buffered += frame.len();
            state.frames.push_back(frame);
        }
        pipe.changed.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl PeerChannel for MemoryChannel {
    fn is_open(&self) -> bool {
        !self.link.closed.load(Ordering::Acquire)
    }

    async fn send_text(&self, text: String) -> Result<(), ChannelError> {
        self.push(Frame::Text(text))
    }

    async fn send_binary(&self, data: Bytes) -> Result<(), ChannelError> {
        self.push(Frame::Binary(data))
    }

    async fn recv(&self) -> Option<Frame> {
        let pipe = self.inbound();
        loop {
            let notified = pipe.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_open() {
                return None;
            }
            let popped = {
                let mut state = pipe.lock();
                let frame = state.frames.pop_front();
                if let Some(f) = &frame {
                    state.buffered = state.buffered.saturating_sub(f.len());
                }
                frame
            };
            if let Some(frame) = popped {
                pipe.changed.notify_waiters();
                return Some(frame);
            }
            notified.await;
        }
    }

    fn buffered_amount(&self) -> usize {
        self.outbound().lock().buffered
    }

    async fn wait_buffered_below(&self, low: usize) -> Result<(), ChannelError> {
        let pipe = self.outbound();
        loop {
            let notified = pipe.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_open() {
                return Err(ChannelError::Closed);
            }
            if pipe.lock().buffered <= low {
                return Ok(());
            }
            notified.await;
        }
    }

    fn close(&self) {
        if self.link.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for pipe in &self.link.pipes {
            {
                let mut state = pipe.lock();
                state.frames.clear();
                state.buffered = 0;
            }
            pipe.changed.notify_waiters();
        }
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}
