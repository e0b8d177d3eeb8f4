use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::signaling::{
    ClientMessage, IceCandidate, PeerId, SdpKind, SessionDescription, SignalPayload,
    SignalingSender,
};

/// Negotiation-progress state of the underlying peer connection, as defined
/// by the platform's signaling state machine. The negotiator only observes
/// it; advancing it is the connection's business.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// The slice of a peer connection the negotiator drives.
///
/// `create_local_offer` and `create_local_answer` both compute a description
/// AND install it as the local description before returning it, matching the
/// combined operation the platform exposes.
#[async_trait]
pub trait PeerConnection: Send {
    fn signaling_state(&self) -> SignalingState;
    async fn create_local_offer(&mut self) -> Result<SessionDescription>;
    async fn create_local_answer(&mut self) -> Result<SessionDescription>;
    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<()>;
    /// Discards the pending local offer. Only meaningful in `HaveLocalOffer`.
    async fn rollback_local_offer(&mut self) -> Result<()>;
    /// `None` is the remote's end-of-candidates marker.
    async fn add_remote_candidate(&mut self, candidate: Option<IceCandidate>) -> Result<()>;
}

/// Drives one peer connection to agreement with one remote peer, resolving
/// simultaneous-offer races through the pre-assigned politeness role: on a
/// collision the polite side abandons its own offer and takes the remote
/// one, the impolite side ignores the remote offer and lets its own stand.
///
/// One instance per pairing. Both flags are plain fields because every
/// operation takes `&mut self`; the remote peer's concurrent activity is
/// the only concurrency there is.
pub struct Negotiator<C, S> {
    conn: C,
    signaling: S,
    remote: PeerId,
    polite: bool,
    making_offer: bool,
    ignore_offer: bool,
}

impl<C, S> Negotiator<C, S>
where
    C: PeerConnection,
    S: SignalingSender,
{
    pub fn new(conn: C, signaling: S, remote: PeerId, polite: bool) -> Self {
        Self {
            conn,
            signaling,
            remote,
            polite,
            making_offer: false,
            ignore_offer: false,
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn remote(&self) -> PeerId {
        self.remote
    }

    pub fn polite(&self) -> bool {
        self.polite
    }

    /// True only while an offer attempt is in flight.
    pub fn making_offer(&self) -> bool {
        self.making_offer
    }

    /// Starts a fresh offer round because something changed locally.
    ///
    /// Failures are logged and swallowed: a broken attempt just waits for
    /// the next renegotiation trigger. The in-flight flag is reset on every
    /// path, or a single bad round would block renegotiation forever.
    pub async fn send_offer(&mut self) {
        self.making_offer = true;
        let result = self.offer_round().await;
        self.making_offer = false;
        if let Err(err) = result {
            warn!("offer attempt abandoned: {err:#}");
        }
    }

    async fn offer_round(&mut self) -> Result<()> {
        let offer = self
            .conn
            .create_local_offer()
            .await
            .context("failed to create offer")?;
        self.signaling
            .send(ClientMessage::Signal {
                to: self.remote,
                payload: SignalPayload::Description(offer),
            })
            .await
    }

    /// Forwards a locally discovered candidate, including the terminating
    /// `None` marker.
    pub async fn send_candidate(&mut self, candidate: Option<IceCandidate>) -> Result<()> {
        self.signaling
            .send(ClientMessage::Signal {
                to: self.remote,
                payload: SignalPayload::Candidate(candidate),
            })
            .await
    }

    /// Applies one message relayed from the paired peer, in delivery order.
    /// `None` stands for an empty or unparsable payload and is ignored, as
    /// is anything arriving after the connection closed.
    ///
    /// Candidate failures surface to the caller unless they are the
    /// expected fallout of an offer this side chose to ignore; description
    /// failures never propagate, so a late or malformed description cannot
    /// take the session down.
    pub async fn handle_signal(&mut self, payload: Option<SignalPayload>) -> Result<()> {
        let Some(payload) = payload else {
            return Ok(());
        };
        if self.conn.signaling_state() == SignalingState::Closed {
            return Ok(());
        }
        match payload {
            SignalPayload::Description(desc) => {
                if let Err(err) = self.apply_description(desc).await {
                    warn!("failed to apply remote description: {err:#}");
                }
                Ok(())
            }
            SignalPayload::Candidate(candidate) => {
                match self.conn.add_remote_candidate(candidate).await {
                    Ok(()) => Ok(()),
                    Err(err) if self.ignore_offer => {
                        debug!("candidate for a discarded offer: {err:#}");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    async fn apply_description(&mut self, desc: SessionDescription) -> Result<()> {
        let collision = desc.kind == SdpKind::Offer
            && (self.making_offer || self.conn.signaling_state() != SignalingState::Stable);
        self.ignore_offer = !self.polite && collision;
        if self.ignore_offer {
            debug!("ignoring colliding offer from {}", self.remote);
            return Ok(());
        }

        let answering = desc.kind == SdpKind::Offer;
        if collision && self.conn.signaling_state() == SignalingState::HaveLocalOffer {
            // The platform will not discard a pending local offer on its
            // own when the remote one arrives; yield ours first.
            self.conn
                .rollback_local_offer()
                .await
                .context("failed to roll back local offer")?;
        }
        self.conn
            .set_remote_description(desc)
            .await
            .context("failed to apply remote description")?;
        if answering {
            let answer = self
                .conn
                .create_local_answer()
                .await
                .context("failed to create answer")?;
            self.signaling
                .send(ClientMessage::Signal {
                    to: self.remote,
                    payload: SignalPayload::Description(answer),
                })
                .await?;
        }
        Ok(())
    }
}
