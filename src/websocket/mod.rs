pub mod broadcaster;
pub mod connection;
pub mod handler;
pub mod registry;

pub use broadcaster::Broadcaster;
pub use handler::{websocket_upgrade, SubscriberSettings};
pub use registry::ConnectionRegistry;
