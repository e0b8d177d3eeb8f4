mod config;
mod lobby;
mod relay;
mod tracing_helper;

use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::{config::Config, lobby::Lobby, relay::talk_handler};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_helper::init_tracing();

    let config = Config::from_env();
    let lobby = Arc::new(Lobby::new());
    let app = Router::new()
        .route("/talk", get(talk_handler))
        .with_state(lobby);

    let listener = TcpListener::bind((config.bind_addr.as_str(), config.port)).await?;
    info!("parley relay listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
