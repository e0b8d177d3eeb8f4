use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use super::{ClientMessage, PeerId, ServerMessage, SignalingReceiver, SignalingSender};

/// Creates an in-process signaling endpoint: the sender/receiver halves a
/// peer uses, plus the matching relay-side link.
pub fn local_endpoint() -> (LocalSender, LocalReceiver, RelaySide) {
    let (client_tx, client_rx) = mpsc::channel(8);
    let (server_tx, server_rx) = mpsc::channel(8);
    (
        LocalSender(client_tx),
        LocalReceiver(server_rx),
        RelaySide {
            from_peer: client_rx,
            to_peer: server_tx,
        },
    )
}

pub struct LocalSender(mpsc::Sender<ClientMessage>);

pub struct LocalReceiver(mpsc::Receiver<ServerMessage>);

/// What the relay holds for one connected peer.
pub struct RelaySide {
    from_peer: mpsc::Receiver<ClientMessage>,
    to_peer: mpsc::Sender<ServerMessage>,
}

#[async_trait]
impl SignalingSender for LocalSender {
    async fn send(&mut self, msg: ClientMessage) -> Result<()> {
        self.0.send(msg).await.map_err(|_| anyhow!("relay closed"))
    }
}

#[async_trait]
impl SignalingReceiver for LocalReceiver {
    async fn recv(&mut self) -> Result<ServerMessage> {
        self.0.recv().await.ok_or_else(|| anyhow!("relay closed"))
    }
}

/// Plays the relay's part between exactly two local peers: greets and pairs
/// them, then forwards signal and chat traffic until either side hangs up.
/// The first endpoint gets the yielding role, the second the insisting one.
pub async fn relay_pair(mut first: RelaySide, mut second: RelaySide) -> Result<()> {
    let first_id = PeerId::random();
    let second_id = PeerId::random();
    first
        .to_peer
        .send(ServerMessage::Welcome { id: first_id })
        .await?;
    second
        .to_peer
        .send(ServerMessage::Welcome { id: second_id })
        .await?;
    first
        .to_peer
        .send(ServerMessage::Paired {
            peer: second_id,
            polite: true,
        })
        .await?;
    second
        .to_peer
        .send(ServerMessage::Paired {
            peer: first_id,
            polite: false,
        })
        .await?;

    loop {
        tokio::select! {
            msg = first.from_peer.recv() => match msg {
                Some(msg) => forward(msg, first_id, second_id, &second.to_peer).await?,
                None => break,
            },
            msg = second.from_peer.recv() => match msg {
                Some(msg) => forward(msg, second_id, first_id, &first.to_peer).await?,
                None => break,
            },
        }
    }
    Ok(())
}

async fn forward(
    msg: ClientMessage,
    from: PeerId,
    partner: PeerId,
    to_partner: &mpsc::Sender<ServerMessage>,
) -> Result<()> {
    match msg {
        ClientMessage::Join => Ok(()),
        ClientMessage::Signal { to, payload } if to == partner => Ok(to_partner
            .send(ServerMessage::Signal { from, payload })
            .await?),
        ClientMessage::Chat { to, text } if to == partner => {
            Ok(to_partner.send(ServerMessage::Chat { from, text }).await?)
        }
        ClientMessage::Leave => Ok(to_partner.send(ServerMessage::PeerLeft).await?),
        other => {
            warn!("dropping misaddressed message from {from}: {other:?}");
            Ok(())
        }
    }
}
