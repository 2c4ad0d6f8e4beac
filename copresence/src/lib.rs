mod session;

pub use copresence_core::{PeerId, RoomId};
pub use session::*;

pub mod model {
    pub use copresence_core::*;
}

pub mod signal {
    pub use copresence_signal::*;
}

pub mod rtc {
    pub use copresence_rtc::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use copresence_server::*;
}
