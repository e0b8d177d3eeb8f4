use std::env;

use anyhow::Result;
use bytes::Bytes;
use parley_lib::{
    connection::RtcPeerConnection,
    session::{pair_up, TalkSession},
    signaling::ws,
};
use tokio::spawn;

/// Connects to a running parley-server, waits in the lobby, and talks to
/// whoever it gets paired with.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("parley_lib=debug,relay_peer=info")
        .init();

    let url = env::var("PARLEY_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/talk".to_owned());
    let (mut sender, mut receiver) = ws::connect(&url).await?;

    println!("waiting in the lobby at {url}...");
    let pairing = pair_up(&mut sender, &mut receiver).await?;
    println!(
        "paired with {} (polite: {})",
        pairing.remote, pairing.polite
    );

    let conn = RtcPeerConnection::new().await?;
    let (session, mut talk, _chat) = TalkSession::new(conn, sender, receiver, pairing)?;
    let session = spawn(session.run());

    talk.wait_open().await;
    talk.outgoing.send(Bytes::from_static(b"hello!")).await?;
    while let Some(msg) = talk.recv().await {
        println!("stranger: {}", String::from_utf8_lossy(&msg));
    }
    println!("stranger left");

    session.abort();
    Ok(())
}
