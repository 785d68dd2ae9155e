//! vlink integration test harness.
//!
//! Every test runs the HTTP/WebSocket server in-process on an ephemeral
//! loopback port and talks to it with reqwest or tokio-tungstenite, or drives
//! the shared hub and transfer sessions directly. Nothing outside the process
//! is required:
//!
//!   cargo test --test integration

mod catalog_http;
mod rendezvous;
mod websocket;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use vlink_api::ApiState;
use vlink_core::config::VlinkConfig;
use vlink_core::{Outbound, ServerMessage};
use vlink_services::{Connection, FileCatalog, PeerView, Rendezvous};

// ── Harness ───────────────────────────────────────────────────────────────────

/// An in-process server. Shut down on drop.
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: Rendezvous,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(static_dir: &Path, control_token: Option<&str>) -> Result<Self> {
        let mut config = VlinkConfig::default();
        config.server.static_dir = static_dir.to_path_buf();
        let hub = Rendezvous::new(FileCatalog::new(), control_token.map(str::to_string));
        let state = ApiState::new(hub.clone(), &config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind loopback listener")?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                rx.await.ok();
            };
            if let Err(e) = vlink_api::serve_listener(listener, state, shutdown).await {
                eprintln!("test server failed: {e:#}");
            }
        });

        Ok(Self {
            addr,
            hub,
            shutdown: Some(tx),
            task,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }
}

/// Scratch directory keyed by test name and process id. Removed on drop.
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!("vlink-it-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).expect("create temp dir");
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.0.join(name);
        std::fs::write(&path, contents).expect("write temp file");
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// A hub client: its connection, outbound queue and the view it has built.
pub struct TestPeer {
    pub conn: Connection,
    pub rx: mpsc::UnboundedReceiver<Outbound>,
    pub view: PeerView,
    /// Relayed envelopes received, in order.
    pub relayed: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl TestPeer {
    pub async fn join(hub: &Rendezvous) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::open(hub.clone(), tx).await.expect("register peer");
        let mut peer = Self {
            conn,
            rx,
            view: PeerView::new(),
            relayed: Vec::new(),
        };
        peer.pump();
        peer
    }

    /// Apply everything queued so far. Returns the server messages seen.
    pub fn pump(&mut self) -> Vec<ServerMessage> {
        let mut seen = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                Outbound::Server(m) => {
                    self.view.apply(&m);
                    seen.push(m);
                }
                Outbound::Relay(body) => self.relayed.push(body),
            }
        }
        seen
    }
}

/// Deterministic filler bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}
