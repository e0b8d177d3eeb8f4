#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parley_lib::negotiation::{PeerConnection, SignalingState};
use parley_lib::signaling::{
    ClientMessage, IceCandidate, SdpKind, SessionDescription, SignalPayload, SignalingSender,
};

/// Scriptable stand-in for the platform connection. Walks the real
/// signaling state machine and records every operation so tests can assert
/// on what the negotiator actually did.
pub struct MockConnection {
    pub state: SignalingState,
    pub offers_created: usize,
    pub answers_created: usize,
    pub remote_descriptions: Vec<SessionDescription>,
    pub candidates_added: Vec<Option<IceCandidate>>,
    pub rollbacks: usize,
    pub fail_next_offer: bool,
    pub fail_candidates: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            state: SignalingState::Stable,
            offers_created: 0,
            answers_created: 0,
            remote_descriptions: Vec::new(),
            candidates_added: Vec::new(),
            rollbacks: 0,
            fail_next_offer: false,
            fail_candidates: false,
        }
    }

    pub fn closed() -> Self {
        let mut conn = Self::new();
        conn.state = SignalingState::Closed;
        conn
    }
}

#[async_trait]
impl PeerConnection for MockConnection {
    fn signaling_state(&self) -> SignalingState {
        self.state
    }

    async fn create_local_offer(&mut self) -> Result<SessionDescription> {
        if self.fail_next_offer {
            self.fail_next_offer = false;
            bail!("offer refused");
        }
        self.offers_created += 1;
        self.state = SignalingState::HaveLocalOffer;
        Ok(SessionDescription {
            kind: SdpKind::Offer,
            sdp: format!("offer-{}", self.offers_created),
        })
    }

    async fn create_local_answer(&mut self) -> Result<SessionDescription> {
        if self.state != SignalingState::HaveRemoteOffer {
            bail!("cannot answer in state {:?}", self.state);
        }
        self.answers_created += 1;
        self.state = SignalingState::Stable;
        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: format!("answer-{}", self.answers_created),
        })
    }

    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<()> {
        match desc.kind {
            SdpKind::Offer => {
                if self.state != SignalingState::Stable {
                    bail!("remote offer while {:?}", self.state);
                }
                self.state = SignalingState::HaveRemoteOffer;
            }
            SdpKind::Answer => {
                if self.state != SignalingState::HaveLocalOffer {
                    bail!("remote answer while {:?}", self.state);
                }
                self.state = SignalingState::Stable;
            }
            SdpKind::Pranswer => {
                if self.state != SignalingState::HaveLocalOffer {
                    bail!("remote pranswer while {:?}", self.state);
                }
                self.state = SignalingState::HaveRemotePranswer;
            }
        }
        self.remote_descriptions.push(desc);
        Ok(())
    }

    async fn rollback_local_offer(&mut self) -> Result<()> {
        if self.state != SignalingState::HaveLocalOffer {
            bail!("nothing to roll back while {:?}", self.state);
        }
        self.rollbacks += 1;
        self.state = SignalingState::Stable;
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: Option<IceCandidate>) -> Result<()> {
        if self.fail_candidates {
            bail!("candidate rejected");
        }
        self.candidates_added.push(candidate);
        Ok(())
    }
}

/// Captures everything the negotiator sends; clone one handle into the
/// negotiator and keep the other for assertions.
#[derive(Clone, Default)]
pub struct CaptureSender {
    sent: Arc<Mutex<Vec<ClientMessage>>>,
}

impl CaptureSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the signal payloads sent so far.
    pub fn drain_signals(&self) -> Vec<SignalPayload> {
        self.sent
            .lock()
            .unwrap()
            .drain(..)
            .filter_map(|msg| match msg {
                ClientMessage::Signal { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignalingSender for CaptureSender {
    async fn send(&mut self, msg: ClientMessage) -> Result<()> {
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }
}

pub fn candidate(line: &str) -> IceCandidate {
    IceCandidate {
        candidate: line.to_owned(),
        sdp_mid: Some("0".to_owned()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}
