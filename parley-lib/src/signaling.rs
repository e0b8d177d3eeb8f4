pub mod local;
pub mod ws;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity the relay assigns to every connected participant. Opaque to
/// peers; only ever used to address the other half of a pairing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct PeerId(pub Uuid);

impl PeerId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Pranswer,
    Answer,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

/// Body of one signaling message between two paired peers.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPayload {
    Description(SessionDescription),
    /// `None` is the end-of-candidates marker and is relayed like any
    /// other candidate.
    Candidate(Option<IceCandidate>),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ClientMessage {
    Join,
    Signal { to: PeerId, payload: SignalPayload },
    Chat { to: PeerId, text: String },
    Leave,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { id: PeerId },
    Paired { peer: PeerId, polite: bool },
    Signal { from: PeerId, payload: SignalPayload },
    Chat { from: PeerId, text: String },
    PeerLeft,
}

#[async_trait]
pub trait SignalingSender: Send {
    async fn send(&mut self, msg: ClientMessage) -> Result<()>;
}

#[async_trait]
pub trait SignalingReceiver: Send {
    async fn recv(&mut self) -> Result<ServerMessage>;
}
