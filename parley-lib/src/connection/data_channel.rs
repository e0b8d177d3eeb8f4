use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tokio::{
    spawn,
    sync::{mpsc, watch},
};
use tracing::warn;
use webrtc::data_channel::RTCDataChannel;

/// Bidirectional talk payload channel riding on the peer connection.
pub struct TalkChannel {
    rtc: Arc<RTCDataChannel>,
    open_rx: mpsc::Receiver<()>,
    pub outgoing: mpsc::Sender<Bytes>,
    incoming_rx: mpsc::Receiver<Bytes>,
    close_rx: mpsc::Receiver<()>,
    pc_disconnected_rx: watch::Receiver<()>,
}

impl TalkChannel {
    pub(super) async fn new(
        rtc: Arc<RTCDataChannel>,
        pc_disconnected_rx: watch::Receiver<()>,
    ) -> Self {
        let (open_tx, open_rx) = mpsc::channel(1);
        let (outgoing, mut outgoing_rx) = mpsc::channel::<Bytes>(4);
        let (incoming_tx, incoming_rx) = mpsc::channel(4);
        let (close_tx, close_rx) = mpsc::channel(1);
        rtc.on_open(Box::new(move || {
            let open_tx = open_tx.clone();
            Box::pin(async move {
                let _ = open_tx.send(()).await;
            })
        }));
        rtc.on_message(Box::new(move |msg| {
            let incoming_tx = incoming_tx.clone();
            Box::pin(async move {
                let _ = incoming_tx.send(msg.data).await;
            })
        }));
        rtc.on_error(Box::new(|err| {
            warn!("talk channel error: {err}");
            Box::pin(async {})
        }));
        rtc.on_close(Box::new(move || {
            let close_tx = close_tx.clone();
            Box::pin(async move {
                let _ = close_tx.send(()).await;
            })
        }));

        {
            // Sending goes through a task so the receiving and sending ends
            // can be held by different owners.
            let rtc = rtc.clone();
            spawn(async move {
                while let Some(data) = outgoing_rx.recv().await {
                    match rtc.send(&data).await {
                        Err(webrtc::Error::ErrClosedPipe) => return,
                        Err(err) => warn!("talk channel send failed: {err}"),
                        Ok(_) => {}
                    }
                }
            });
        }

        Self {
            rtc,
            open_rx,
            outgoing,
            incoming_rx,
            close_rx,
            pc_disconnected_rx,
        }
    }

    pub async fn wait_open(&mut self) {
        let _ = self.open_rx.recv().await;
    }

    /// `None` once the channel or the whole peer connection has closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        tokio::select! {
            data = self.incoming_rx.recv() => data,
            _ = self.close_rx.recv() => None,
            _ = self.pc_disconnected_rx.changed() => None,
        }
    }

    pub async fn close(&self) -> Result<()> {
        Ok(self.rtc.close().await?)
    }
}
