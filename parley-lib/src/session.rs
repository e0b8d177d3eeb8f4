use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    connection::{ConnectionEvents, RtcPeerConnection, TalkChannel},
    negotiation::Negotiator,
    signaling::{ClientMessage, PeerId, ServerMessage, SignalingReceiver, SignalingSender},
};

/// Pairing data handed out by the relay, fixed for the session's lifetime.
#[derive(Clone, Copy, Debug)]
pub struct Pairing {
    pub local: PeerId,
    pub remote: PeerId,
    pub polite: bool,
}

/// Joins the lobby and waits until the relay pairs this peer with a
/// stranger.
pub async fn pair_up<S, R>(sender: &mut S, receiver: &mut R) -> Result<Pairing>
where
    S: SignalingSender,
    R: SignalingReceiver,
{
    sender
        .send(ClientMessage::Join)
        .await
        .context("failed to join the lobby")?;
    let mut local = None;
    loop {
        match receiver.recv().await? {
            ServerMessage::Welcome { id } => local = Some(id),
            ServerMessage::Paired { peer, polite } => {
                let local = local.ok_or_else(|| anyhow!("paired before welcome"))?;
                return Ok(Pairing {
                    local,
                    remote: peer,
                    polite,
                });
            }
            other => warn!("unexpected message while pairing: {other:?}"),
        }
    }
}

/// Per-pairing controller: feeds connection events and relayed messages
/// into the negotiator until the stranger leaves or the connection dies.
pub struct TalkSession<S, R> {
    negotiator: Negotiator<RtcPeerConnection, S>,
    events: ConnectionEvents,
    receiver: R,
    remote: PeerId,
    chat_tx: mpsc::Sender<String>,
}

impl<S, R> TalkSession<S, R>
where
    S: SignalingSender,
    R: SignalingReceiver,
{
    /// Returns the session, the talk channel for the caller to speak over,
    /// and the stream of chat lines relayed outside the channel.
    pub fn new(
        mut conn: RtcPeerConnection,
        sender: S,
        receiver: R,
        pairing: Pairing,
    ) -> Result<(Self, TalkChannel, mpsc::Receiver<String>)> {
        let events = conn
            .take_events()
            .ok_or_else(|| anyhow!("connection events already taken"))?;
        let talk = conn
            .take_talk_channel()
            .ok_or_else(|| anyhow!("talk channel already taken"))?;
        let (chat_tx, chat_rx) = mpsc::channel(8);
        let negotiator = Negotiator::new(conn, sender, pairing.remote, pairing.polite);
        Ok((
            Self {
                negotiator,
                events,
                receiver,
                remote: pairing.remote,
                chat_tx,
            },
            talk,
            chat_rx,
        ))
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                Some(()) = self.events.negotiation_needed_rx.recv() => {
                    self.negotiator.send_offer().await;
                }
                Some(candidate) = self.events.candidate_rx.recv() => {
                    self.negotiator.send_candidate(candidate).await?;
                }
                _ = self.events.disconnected_rx.changed() => {
                    debug!("peer connection lost");
                    return Ok(());
                }
                msg = self.receiver.recv() => match msg? {
                    ServerMessage::Signal { from, payload } if from == self.remote => {
                        if let Err(err) = self.negotiator.handle_signal(Some(payload)).await {
                            warn!("failed to add remote candidate: {err:#}");
                        }
                    }
                    ServerMessage::Signal { from, .. } => {
                        warn!("dropping signal from unpaired peer {from}");
                    }
                    ServerMessage::Chat { from, text } if from == self.remote => {
                        if self.chat_tx.try_send(text).is_err() {
                            debug!("chat line dropped, receiver backed up or gone");
                        }
                    }
                    ServerMessage::PeerLeft => {
                        debug!("paired peer left");
                        return Ok(());
                    }
                    other => debug!("ignoring {other:?}"),
                },
            }
        }
    }
}
