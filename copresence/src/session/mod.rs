mod session;
mod session_builder;

pub use session::*;
pub use session_builder::*;
