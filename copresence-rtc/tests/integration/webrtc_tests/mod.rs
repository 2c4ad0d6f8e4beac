mod test_real_transport_connects_and_carries_data;

use std::sync::Arc;

use copresence_rtc::{NoMedia, RtcTransportFactory, SessionConfig, StaticIceConfig};

use crate::utils::PeerSetup;

pub fn host_only() -> PeerSetup {
    PeerSetup {
        ice: Arc::new(StaticIceConfig::new(Vec::new())),
        media: Arc::new(NoMedia),
        transports: Arc::new(RtcTransportFactory),
        config: SessionConfig {
            negotiation_timeout_ms: 15_000,
            ..SessionConfig::default()
        },
    }
}
