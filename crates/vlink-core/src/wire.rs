//! Wire format: JSON envelopes exchanged with the rendezvous server,
//! and control messages carried on an established peer channel.
//!
//! Server → client messages are a closed set (`ServerMessage`). Everything a
//! client sends that is not `update-files` is a directed signal: it carries a
//! `target` and is relayed verbatim, except that `from` is always stamped by
//! the server with the sender's id. A `from` supplied on the wire is discarded.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::files::FileDescriptor;

/// Identifier of a connected peer. Unique among live connections.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Server → client ───────────────────────────────────────────────────────────

/// Messages originated by the rendezvous server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First message on every connection: the id assigned to this peer.
    Id { id: PeerId },
    /// Every other currently connected peer.
    PeersList { peers: Vec<PeerId> },
    PeerConnected { id: PeerId },
    PeerDisconnected { id: PeerId },
    /// The full shared catalog.
    FilesList { files: Vec<FileDescriptor> },
}

/// Message type names only the server may emit.
const SERVER_ONLY_TYPES: [&str; 5] = [
    "id",
    "peers-list",
    "peer-connected",
    "peer-disconnected",
    "files-list",
];

/// Anything pushed down a peer's outbound sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Server(ServerMessage),
    /// A relayed signal, already stamped with `from`.
    Relay(Map<String, Value>),
}

impl Outbound {
    pub fn to_text(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<ServerMessage> for Outbound {
    fn from(msg: ServerMessage) -> Self {
        Outbound::Server(msg)
    }
}

// ── Directed signals ──────────────────────────────────────────────────────────

/// Kind of a directed negotiation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
    /// Any other negotiation payload; relayed without interpretation.
    Other(String),
}

impl SignalKind {
    pub fn as_str(&self) -> &str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::Candidate => "candidate",
            SignalKind::Other(s) => s,
        }
    }
}

impl From<&str> for SignalKind {
    fn from(s: &str) -> Self {
        match s {
            "offer" => SignalKind::Offer,
            "answer" => SignalKind::Answer,
            "candidate" => SignalKind::Candidate,
            other => SignalKind::Other(other.to_string()),
        }
    }
}

/// A directed message addressed to one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub target: PeerId,
    /// Server-stamped sender. None until stamped.
    pub from: Option<PeerId>,
    /// The envelope as received, minus `from`.
    pub body: Map<String, Value>,
}

impl Signal {
    /// Build an outgoing signal. `payload` fields are merged into the envelope.
    pub fn new(kind: SignalKind, target: PeerId, payload: Map<String, Value>) -> Self {
        let mut body = payload;
        body.remove("from");
        body.insert("type".into(), Value::String(kind.as_str().to_string()));
        body.insert("target".into(), Value::String(target.to_string()));
        Self {
            kind,
            target,
            from: None,
            body,
        }
    }

    /// Stamp the authenticated sender and produce the relayed envelope.
    pub fn stamp(self, from: &PeerId) -> Outbound {
        let mut body = self.body;
        body.insert("from".into(), Value::String(from.to_string()));
        Outbound::Relay(body)
    }

    /// Named payload field (`offer`, `answer`, `candidate`, ...).
    pub fn payload(&self) -> Option<&Value> {
        self.body.get(self.kind.as_str())
    }

    pub fn to_text(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(&self.body)?)
    }

    fn from_map(kind: &str, mut map: Map<String, Value>) -> Result<Self, WireError> {
        let target = map
            .get("target")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(PeerId::from)
            .ok_or(WireError::MissingField("target"))?;
        let from = match map.remove("from") {
            Some(Value::String(s)) => Some(PeerId::new(s)),
            _ => None,
        };
        Ok(Self {
            kind: SignalKind::from(kind),
            target,
            from,
            body: map,
        })
    }
}

// ── Client → server ───────────────────────────────────────────────────────────

/// A parsed envelope received by the server from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Wholesale catalog replacement.
    UpdateFiles {
        files: Vec<FileDescriptor>,
        token: Option<String>,
    },
    Signal(Signal),
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let mut map: Map<String, Value> = serde_json::from_str(text)?;
        let kind = type_of(&map)?;

        if kind == "update-files" {
            let files = map.remove("files").ok_or(WireError::MissingField("files"))?;
            let files: Vec<FileDescriptor> = serde_json::from_value(files)?;
            let token = map.get("token").and_then(Value::as_str).map(str::to_string);
            return Ok(ClientMessage::UpdateFiles { files, token });
        }
        if SERVER_ONLY_TYPES.contains(&kind.as_str()) {
            return Err(WireError::ServerOnly(kind));
        }
        // Never trust a client-supplied sender.
        map.remove("from");
        Ok(ClientMessage::Signal(Signal::from_map(&kind, map)?))
    }
}

/// A parsed envelope received by a client from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Server(ServerMessage),
    Signal(Signal),
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let map: Map<String, Value> = serde_json::from_str(text)?;
        let kind = type_of(&map)?;
        if SERVER_ONLY_TYPES.contains(&kind.as_str()) {
            let msg = serde_json::from_value(Value::Object(map))?;
            return Ok(Inbound::Server(msg));
        }
        Ok(Inbound::Signal(Signal::from_map(&kind, map)?))
    }
}

fn type_of(map: &Map<String, Value>) -> Result<String, WireError> {
    map.get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(WireError::MissingField("type"))
}

// ── Peer channel control lane ─────────────────────────────────────────────────

/// Text-lane messages on an established peer channel. Chunks travel on the
/// binary lane with no envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PeerControl {
    FileMetadata {
        name: String,
        size: u64,
        #[serde(rename = "fileType", default)]
        file_type: String,
    },
    FileComplete,
}

impl PeerControl {
    pub fn to_text(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn parse(text: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("`{0}` is a server-only message type")]
    ServerOnly(String),
}
