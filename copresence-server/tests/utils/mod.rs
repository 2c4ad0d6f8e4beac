pub mod relay_helpers;

pub use relay_helpers::*;
