mod support;

use anyhow::Result;
use parley_lib::negotiation::{Negotiator, SignalingState};
use parley_lib::session::pair_up;
use parley_lib::signaling::{
    local::{local_endpoint, relay_pair, LocalReceiver, LocalSender},
    ServerMessage, SignalPayload, SignalingReceiver,
};

use support::MockConnection;

async fn next_signal(receiver: &mut LocalReceiver) -> Result<SignalPayload> {
    loop {
        match receiver.recv().await? {
            ServerMessage::Signal { payload, .. } => return Ok(payload),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn local_relay_pairs_with_complementary_roles() {
    let (mut first_tx, mut first_rx, first_link) = local_endpoint();
    let (mut second_tx, mut second_rx, second_link) = local_endpoint();
    let relay = tokio::spawn(relay_pair(first_link, second_link));

    let (first, second) = tokio::join!(
        pair_up(&mut first_tx, &mut first_rx),
        pair_up(&mut second_tx, &mut second_rx),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.remote, second.local);
    assert_eq!(second.remote, first.local);
    assert!(first.polite != second.polite);

    drop(first_tx);
    drop(second_tx);
    relay.await.unwrap().unwrap();
}

#[tokio::test]
async fn negotiation_completes_across_the_local_relay() {
    let (mut caller_tx, mut caller_rx, caller_link) = local_endpoint();
    let (mut callee_tx, mut callee_rx, callee_link) = local_endpoint();
    let _relay = tokio::spawn(relay_pair(caller_link, callee_link));

    let (caller_pairing, callee_pairing) = tokio::join!(
        pair_up(&mut caller_tx, &mut caller_rx),
        pair_up(&mut callee_tx, &mut callee_rx),
    );
    let caller_pairing = caller_pairing.unwrap();
    let callee_pairing = callee_pairing.unwrap();

    let mut caller: Negotiator<MockConnection, LocalSender> = Negotiator::new(
        MockConnection::new(),
        caller_tx,
        caller_pairing.remote,
        caller_pairing.polite,
    );
    let mut callee: Negotiator<MockConnection, LocalSender> = Negotiator::new(
        MockConnection::new(),
        callee_tx,
        callee_pairing.remote,
        callee_pairing.polite,
    );

    caller.send_offer().await;
    let offer = next_signal(&mut callee_rx).await.unwrap();
    callee.handle_signal(Some(offer)).await.unwrap();

    let answer = next_signal(&mut caller_rx).await.unwrap();
    caller.handle_signal(Some(answer)).await.unwrap();

    assert_eq!(caller.connection().state, SignalingState::Stable);
    assert_eq!(callee.connection().state, SignalingState::Stable);
}
