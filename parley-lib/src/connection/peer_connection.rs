use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::debug;
use webrtc::{
    api::{setting_engine::SettingEngine, APIBuilder},
    data_channel::data_channel_init::RTCDataChannelInit,
    ice_transport::{ice_candidate::RTCIceCandidateInit, ice_server::RTCIceServer},
    peer_connection::{
        configuration::RTCConfiguration,
        peer_connection_state::RTCPeerConnectionState,
        sdp::{sdp_type::RTCSdpType, session_description::RTCSessionDescription},
        signaling_state::RTCSignalingState,
        RTCPeerConnection,
    },
};

use crate::{
    negotiation::{self, SignalingState},
    signaling::{IceCandidate, SdpKind, SessionDescription},
};

use super::TalkChannel;

const TALK_CHANNEL_LABEL: &str = "talk";
const TALK_PROTOCOL: &str = "PARLEY/1.0";
// Pre-agreed stream id so both peers open the same channel without waiting
// for the other side to announce one.
const TALK_CHANNEL_ID: u16 = 0;

fn default_config() -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: vec!["stun:stun.l.google.com:19302".to_owned()],
            ..Default::default()
        }],
        ..Default::default()
    }
}

async fn create_peer_connection() -> Result<RTCPeerConnection> {
    let mut setting_engine = SettingEngine::default();
    setting_engine.set_ice_timeouts(None, Some(Duration::from_secs(20 * 60)), None);
    Ok(APIBuilder::new()
        .with_setting_engine(setting_engine)
        .build()
        .new_peer_connection(default_config())
        .await?)
}

/// Connection-driven events, adapted from the underlying callbacks into
/// channels so one task can own the reaction to all of them.
pub struct ConnectionEvents {
    pub negotiation_needed_rx: mpsc::Receiver<()>,
    pub candidate_rx: mpsc::Receiver<Option<IceCandidate>>,
    pub disconnected_rx: watch::Receiver<()>,
}

/// A real peer connection plus its talk channel, set up so that creating it
/// on both ends of a pairing immediately demands renegotiation on both
/// ends at once, the race the negotiator exists to resolve.
pub struct RtcPeerConnection {
    rtc: Arc<RTCPeerConnection>,
    events: Option<ConnectionEvents>,
    talk_channel: Option<TalkChannel>,
}

impl RtcPeerConnection {
    pub async fn new() -> Result<Self> {
        let rtc = Arc::new(create_peer_connection().await?);

        let (negotiation_needed_tx, negotiation_needed_rx) = mpsc::channel(4);
        rtc.on_negotiation_needed(Box::new(move || {
            let tx = negotiation_needed_tx.clone();
            Box::pin(async move {
                let _ = tx.send(()).await;
            })
        }));

        let (candidate_tx, candidate_rx) = mpsc::channel(16);
        rtc.on_ice_candidate(Box::new(move |candidate| {
            let tx = candidate_tx.clone();
            Box::pin(async move {
                match candidate {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => {
                            let _ = tx.send(Some(candidate_from_init(init))).await;
                        }
                        Err(err) => debug!("skipping unencodable local candidate: {err}"),
                    },
                    None => {
                        let _ = tx.send(None).await;
                    }
                }
            })
        }));

        let (disconnected_tx, disconnected_rx) = watch::channel(());
        rtc.on_peer_connection_state_change(Box::new(move |state| {
            debug!("peer connection state: {state}");
            if matches!(
                state,
                RTCPeerConnectionState::Disconnected
                    | RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Closed
            ) {
                let _ = disconnected_tx.send(());
            }
            Box::pin(async {})
        }));

        let rtc_channel = rtc
            .create_data_channel(
                TALK_CHANNEL_LABEL,
                Some(RTCDataChannelInit {
                    protocol: Some(TALK_PROTOCOL.to_owned()),
                    negotiated: Some(TALK_CHANNEL_ID),
                    ..Default::default()
                }),
            )
            .await?;
        let talk_channel = TalkChannel::new(rtc_channel, disconnected_rx.clone()).await;

        Ok(Self {
            rtc,
            events: Some(ConnectionEvents {
                negotiation_needed_rx,
                candidate_rx,
                disconnected_rx,
            }),
            talk_channel: Some(talk_channel),
        })
    }

    pub fn take_events(&mut self) -> Option<ConnectionEvents> {
        self.events.take()
    }

    pub fn take_talk_channel(&mut self) -> Option<TalkChannel> {
        self.talk_channel.take()
    }

    pub async fn close(&self) -> Result<()> {
        Ok(self.rtc.close().await?)
    }
}

fn state_from_rtc(state: RTCSignalingState) -> SignalingState {
    match state {
        RTCSignalingState::Stable => SignalingState::Stable,
        RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
        RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
        RTCSignalingState::HaveLocalPranswer => SignalingState::HaveLocalPranswer,
        RTCSignalingState::HaveRemotePranswer => SignalingState::HaveRemotePranswer,
        RTCSignalingState::Closed | RTCSignalingState::Unspecified => SignalingState::Closed,
    }
}

fn desc_to_wire(desc: &RTCSessionDescription) -> Result<SessionDescription> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        RTCSdpType::Answer => SdpKind::Answer,
        other => bail!("unexpected local description type: {other}"),
    };
    Ok(SessionDescription {
        kind,
        sdp: desc.sdp.clone(),
    })
}

fn desc_from_wire(desc: SessionDescription) -> Result<RTCSessionDescription> {
    Ok(match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpKind::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)?,
    })
}

fn candidate_from_init(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn candidate_to_init(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: candidate.username_fragment,
    }
}

#[async_trait]
impl negotiation::PeerConnection for RtcPeerConnection {
    fn signaling_state(&self) -> SignalingState {
        state_from_rtc(self.rtc.signaling_state())
    }

    async fn create_local_offer(&mut self) -> Result<SessionDescription> {
        let offer = self.rtc.create_offer(None).await?;
        self.rtc.set_local_description(offer).await?;
        let desc = self
            .rtc
            .local_description()
            .await
            .ok_or_else(|| anyhow!("local description missing after offer"))?;
        desc_to_wire(&desc)
    }

    async fn create_local_answer(&mut self) -> Result<SessionDescription> {
        let answer = self.rtc.create_answer(None).await?;
        self.rtc.set_local_description(answer).await?;
        let desc = self
            .rtc
            .local_description()
            .await
            .ok_or_else(|| anyhow!("local description missing after answer"))?;
        desc_to_wire(&desc)
    }

    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<()> {
        Ok(self.rtc.set_remote_description(desc_from_wire(desc)?).await?)
    }

    async fn rollback_local_offer(&mut self) -> Result<()> {
        // An empty rollback description is rejected, so resubmit the
        // pending offer's SDP under the rollback type.
        let pending = self
            .rtc
            .pending_local_description()
            .await
            .ok_or_else(|| anyhow!("no pending local description to roll back"))?;
        let mut rollback = RTCSessionDescription::default();
        rollback.sdp_type = RTCSdpType::Rollback;
        rollback.sdp = pending.sdp;
        Ok(self.rtc.set_local_description(rollback).await?)
    }

    async fn add_remote_candidate(&mut self, candidate: Option<IceCandidate>) -> Result<()> {
        // End-of-candidates travels as an empty candidate line.
        let init = candidate.map(candidate_to_init).unwrap_or_default();
        Ok(self.rtc.add_ice_candidate(init).await?)
    }
}
