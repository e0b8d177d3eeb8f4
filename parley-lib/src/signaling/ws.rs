use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::warn;

use super::{ClientMessage, ServerMessage, SignalingReceiver, SignalingSender};

#[derive(Debug, Error)]
pub enum WsSignalingError {
    #[error("failed to reach the relay: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("relay connection failed: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("relay closed the connection")]
    Closed,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsSender {
    sink: SplitSink<WsStream, tungstenite::Message>,
}

pub struct WsReceiver {
    stream: SplitStream<WsStream>,
}

/// Connects to a parley relay and splits the socket into the two
/// signaling halves.
pub async fn connect(url: &str) -> Result<(WsSender, WsReceiver), WsSignalingError> {
    let (socket, _) = connect_async(url)
        .await
        .map_err(WsSignalingError::Connect)?;
    let (sink, stream) = socket.split();
    Ok((WsSender { sink }, WsReceiver { stream }))
}

#[async_trait]
impl SignalingSender for WsSender {
    async fn send(&mut self, msg: ClientMessage) -> anyhow::Result<()> {
        let json = serde_json::to_string(&msg)?;
        self.sink
            .send(tungstenite::Message::Text(json))
            .await
            .map_err(WsSignalingError::Transport)?;
        Ok(())
    }
}

#[async_trait]
impl SignalingReceiver for WsReceiver {
    async fn recv(&mut self) -> anyhow::Result<ServerMessage> {
        loop {
            let msg = self
                .stream
                .next()
                .await
                .ok_or(WsSignalingError::Closed)?
                .map_err(WsSignalingError::Transport)?;
            match msg {
                tungstenite::Message::Text(text) => match serde_json::from_str(&text) {
                    Ok(msg) => return Ok(msg),
                    Err(err) => warn!("skipping unparsable relay frame: {err}"),
                },
                tungstenite::Message::Close(_) => return Err(WsSignalingError::Closed.into()),
                _ => {}
            }
        }
    }
}
