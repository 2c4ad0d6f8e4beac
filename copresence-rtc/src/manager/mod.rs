mod connection_manager;
mod manager_command;
mod pool;
mod session_event;

pub use connection_manager::*;
pub use pool::*;
pub use session_event::*;
