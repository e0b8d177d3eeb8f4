mod data_channel;
mod peer_connection;

pub use data_channel::TalkChannel;
pub use peer_connection::{ConnectionEvents, RtcPeerConnection};
