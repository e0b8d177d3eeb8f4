use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use parley_lib::signaling::{ClientMessage, PeerId, ServerMessage};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::lobby::Lobby;

pub async fn talk_handler(
    ws: WebSocketUpgrade,
    State(lobby): State<Arc<Lobby>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, lobby))
}

async fn handle_socket(socket: WebSocket, lobby: Arc<Lobby>) {
    let id = PeerId::random();
    info!("peer {id} connected");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    lobby.register(id, tx);
    lobby.send_to(id, ServerMessage::Welcome { id });

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(err) => {
                    warn!("failed to encode server message: {err}");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let lobby = lobby.clone();
        async move {
            while let Some(Ok(msg)) = stream.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => handle_message(&lobby, id, msg).await,
                        Err(err) => warn!("invalid message from {id}: {err}"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    lobby.remove(id).await;
    info!("peer {id} disconnected");
}

async fn handle_message(lobby: &Lobby, from: PeerId, msg: ClientMessage) {
    match msg {
        ClientMessage::Join => lobby.join(from).await,
        ClientMessage::Signal { to, payload } => {
            if lobby.partner_of(from) == Some(to) {
                lobby.send_to(to, ServerMessage::Signal { from, payload });
            } else {
                warn!("{from} signaled unpaired peer {to}");
            }
        }
        ClientMessage::Chat { to, text } => {
            if lobby.partner_of(from) == Some(to) {
                lobby.send_to(to, ServerMessage::Chat { from, text });
            } else {
                warn!("{from} messaged unpaired peer {to}");
            }
        }
        ClientMessage::Leave => lobby.leave(from).await,
    }
}
