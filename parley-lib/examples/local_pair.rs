use anyhow::Result;
use bytes::Bytes;
use parley_lib::{
    connection::RtcPeerConnection,
    session::{pair_up, TalkSession},
    signaling::local::{local_endpoint, relay_pair, LocalReceiver, LocalSender},
};
use tokio::spawn;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("parley_lib=debug,local_pair=info")
        .init();

    let (first_tx, first_rx, first_link) = local_endpoint();
    let (second_tx, second_rx, second_link) = local_endpoint();
    let _relay = spawn(relay_pair(first_link, second_link));

    let first = spawn(run_peer(first_tx, first_rx, true));
    let second = spawn(run_peer(second_tx, second_rx, false));
    first.await??;
    second.await??;
    Ok(())
}

async fn run_peer(
    mut sender: LocalSender,
    mut receiver: LocalReceiver,
    speaks_first: bool,
) -> Result<()> {
    let pairing = pair_up(&mut sender, &mut receiver).await?;
    println!(
        "{} paired with {} (polite: {})",
        pairing.local, pairing.remote, pairing.polite
    );

    let conn = RtcPeerConnection::new().await?;
    let (session, mut talk, _chat) = TalkSession::new(conn, sender, receiver, pairing)?;
    let session = spawn(session.run());

    talk.wait_open().await;
    if speaks_first {
        talk.outgoing
            .send(Bytes::from_static(b"hello stranger"))
            .await?;
        let reply = talk.recv().await;
        println!("{} got: {:?}", pairing.local, reply);
    } else {
        let msg = talk.recv().await;
        println!("{} got: {:?}", pairing.local, msg);
        talk.outgoing
            .send(Bytes::from_static(b"hello yourself"))
            .await?;
    }

    talk.close().await?;
    session.abort();
    Ok(())
}
