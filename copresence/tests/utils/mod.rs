pub mod session_helpers;

pub use session_helpers::*;
