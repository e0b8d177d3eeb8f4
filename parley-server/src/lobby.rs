use std::collections::VecDeque;

use dashmap::DashMap;
use parley_lib::signaling::{PeerId, ServerMessage};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Pairs waiting participants and tracks who is talking to whom.
///
/// The longest waiter gets the yielding role in its pairing; the newcomer
/// insists. Exactly one side of every pair yields, which is what lets the
/// peers sort out simultaneous offers without the relay arbitrating.
pub struct Lobby {
    peers: DashMap<PeerId, mpsc::UnboundedSender<ServerMessage>>,
    waiting: Mutex<VecDeque<PeerId>>,
    pairs: DashMap<PeerId, PeerId>,
}

impl Lobby {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
            waiting: Mutex::new(VecDeque::new()),
            pairs: DashMap::new(),
        }
    }

    pub fn register(&self, id: PeerId, tx: mpsc::UnboundedSender<ServerMessage>) {
        self.peers.insert(id, tx);
    }

    /// False if the peer is gone or its socket already failed.
    pub fn send_to(&self, id: PeerId, msg: ServerMessage) -> bool {
        match self.peers.get(&id) {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn partner_of(&self, id: PeerId) -> Option<PeerId> {
        self.pairs.get(&id).map(|partner| *partner)
    }

    /// Pairs the joiner with the longest waiter still connected, or queues
    /// it.
    pub async fn join(&self, id: PeerId) {
        if self.pairs.contains_key(&id) {
            warn!("{id} tried to join while already paired");
            return;
        }
        let mut waiting = self.waiting.lock().await;
        if waiting.contains(&id) {
            return;
        }
        while let Some(waiter) = waiting.pop_front() {
            if !self.send_to(
                waiter,
                ServerMessage::Paired {
                    peer: id,
                    polite: true,
                },
            ) {
                debug!("skipping stale waiter {waiter}");
                continue;
            }
            self.send_to(
                id,
                ServerMessage::Paired {
                    peer: waiter,
                    polite: false,
                },
            );
            self.pairs.insert(waiter, id);
            self.pairs.insert(id, waiter);
            debug!("paired {waiter} with {id}");
            return;
        }
        waiting.push_back(id);
        debug!("{id} is waiting for a stranger");
    }

    /// Dissolves the peer's pairing or queue spot; the socket stays up so
    /// the peer can join again.
    pub async fn leave(&self, id: PeerId) {
        self.waiting.lock().await.retain(|waiter| *waiter != id);
        if let Some((_, partner)) = self.pairs.remove(&id) {
            self.pairs.remove(&partner);
            self.send_to(partner, ServerMessage::PeerLeft);
        }
    }

    /// Drops the peer entirely; the partner, if any, is notified.
    pub async fn remove(&self, id: PeerId) {
        self.leave(id).await;
        self.peers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(lobby: &Lobby) -> (PeerId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = PeerId::random();
        let (tx, rx) = mpsc::unbounded_channel();
        lobby.register(id, tx);
        (id, rx)
    }

    #[tokio::test]
    async fn waiter_and_joiner_get_complementary_roles() {
        let lobby = Lobby::new();
        let (first, mut first_rx) = connect(&lobby);
        let (second, mut second_rx) = connect(&lobby);

        lobby.join(first).await;
        lobby.join(second).await;

        match first_rx.try_recv().unwrap() {
            ServerMessage::Paired { peer, polite } => {
                assert_eq!(peer, second);
                assert!(polite);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        match second_rx.try_recv().unwrap() {
            ServerMessage::Paired { peer, polite } => {
                assert_eq!(peer, first);
                assert!(!polite);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert_eq!(lobby.partner_of(first), Some(second));
        assert_eq!(lobby.partner_of(second), Some(first));
    }

    #[tokio::test]
    async fn stale_waiter_is_skipped() {
        let lobby = Lobby::new();
        let (gone, gone_rx) = connect(&lobby);
        lobby.join(gone).await;
        drop(gone_rx);

        let (fresh, _fresh_rx) = connect(&lobby);
        lobby.join(fresh).await;

        assert_eq!(lobby.partner_of(fresh), None);
        assert!(lobby.waiting.lock().await.contains(&fresh));
    }

    #[tokio::test]
    async fn leaving_notifies_the_partner_and_dissolves_the_pair() {
        let lobby = Lobby::new();
        let (first, mut first_rx) = connect(&lobby);
        let (second, mut second_rx) = connect(&lobby);
        lobby.join(first).await;
        lobby.join(second).await;
        first_rx.try_recv().unwrap();
        second_rx.try_recv().unwrap();

        lobby.leave(first).await;

        assert!(matches!(
            second_rx.try_recv().unwrap(),
            ServerMessage::PeerLeft
        ));
        assert_eq!(lobby.partner_of(first), None);
        assert_eq!(lobby.partner_of(second), None);
    }

    #[tokio::test]
    async fn leaving_the_queue_prevents_pairing() {
        let lobby = Lobby::new();
        let (first, _first_rx) = connect(&lobby);
        lobby.join(first).await;
        lobby.leave(first).await;

        let (second, _second_rx) = connect(&lobby);
        lobby.join(second).await;

        assert_eq!(lobby.partner_of(second), None);
    }

    #[tokio::test]
    async fn double_join_keeps_a_single_queue_spot() {
        let lobby = Lobby::new();
        let (first, _first_rx) = connect(&lobby);
        lobby.join(first).await;
        lobby.join(first).await;

        assert_eq!(lobby.waiting.lock().await.len(), 1);
    }
}
