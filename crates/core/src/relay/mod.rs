//! Relay subsystem: host lifecycle plus the connection proxy.
//!
//! The realtime connection physically lives in a hidden persistent document
//! (the relay host); this module keeps that document alive and tunnels
//! socket operations to it.

/// Relay host existence/creation management.
pub mod lifecycle;
/// Connection-like proxy over the relay host.
pub mod proxy;
/// Outbound buffering while the host is not ready.
pub(crate) mod queue;

pub use lifecycle::{HostRuntime, RelayHostManager};
pub use proxy::{HandlerId, RelayPort, SocketProxy};
