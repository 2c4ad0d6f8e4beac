pub mod channel;
pub mod error;
pub mod store;

pub use channel::*;
pub use error::{Result, SignalError};
pub use store::*;
