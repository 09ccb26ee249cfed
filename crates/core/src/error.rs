//! Error types for the coordinator core.
//!
//! Variants carry owned strings rather than source errors so the whole enum
//! is `Clone`: the relay-host single-flight future hands one outcome to every
//! concurrent caller.

use thiserror::Error;

/// Coordinator error type.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The relay host could not be created from any candidate document.
    #[error("relay host creation failed: {0}")]
    HostCreate(String),

    /// Delivery to the relay host failed after retries.
    #[error("relay delivery failed: {0}")]
    Transport(String),

    /// No receiver exists for the delivery target.
    #[error("no receiver for relay message")]
    NoReceiver,

    /// The ordered-ack queue hit its bound and evicted this emission.
    #[error("ack queue full; oldest pending emission evicted")]
    AckQueueFull,

    /// An ack-expecting emission saw no reply within the deadline.
    #[error("timed out waiting for ack to '{0}'")]
    AckTimeout(String),

    /// The reply channel closed before an outcome arrived.
    #[error("reply channel closed")]
    ChannelClosed,

    /// A browser tab operation failed.
    #[error("tab operation failed: {0}")]
    Tab(String),

    /// A page-channel operation failed.
    #[error("page channel failed: {0}")]
    Page(String),
}

/// Result alias used throughout the coordinator.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the "no receiver" transport class that warrants relay-host
    /// re-creation before a retry.
    pub fn is_no_receiver(&self) -> bool {
        matches!(self, Error::NoReceiver)
    }
}
