pub mod config;
pub mod error;
pub mod ice;
pub mod manager;
pub mod media;
pub mod negotiator;
pub mod transport;

pub use config::SessionConfig;
pub use error::{NegotiationError, Result};
pub use ice::{HttpIceConfig, IceConfigProvider, StaticIceConfig};
pub use manager::*;
pub use media::{LocalStream, MediaCache, MediaProvider, NoMedia, SilentAudioSource};
pub use negotiator::*;
pub use transport::*;
