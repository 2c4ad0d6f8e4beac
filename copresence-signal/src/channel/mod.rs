mod room_registry;
mod signal_channel;
mod watchers;

pub use room_registry::RoomRegistry;
pub use signal_channel::SignalChannel;
