use std::panic;

use time::format_description::well_known::Iso8601;
use tracing::error;
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub fn init_tracing() {
    let layer = fmt::layer()
        .compact()
        .with_thread_ids(true)
        .with_timer(LocalTime::new(Iso8601::DEFAULT));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(concat!(env!("CARGO_CRATE_NAME"), "=info")));
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
    panic::set_hook(Box::new(|panic| error!("{panic}")));
}
