//! Envelope format tunneling socket operations between the ephemeral
//! background context and the persistent relay host.
//!
//! The two execution contexts share no memory; everything crosses as one of
//! these tagged messages. `SocketEmit` carries an optional `ack_id` so the
//! host can correlate its `SocketAck` reply with the waiting caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages the coordinator sends to the relay host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostBound {
    /// Ask the host to (re)establish its realtime connection.
    SocketConnect,
    /// Forward one socket emission through the host.
    SocketEmit {
        event: String,
        args: Value,
        expect_ack: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        ack_id: Option<u64>,
    },
}

/// Messages the relay host sends to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreBound {
    /// The host's keep-alive started and its realtime connection is open.
    OffscreenReady { at_ms: u64, connection_id: String },
    /// Realtime connection status change observed by the host.
    SocketStatus { connected: bool },
    /// An inbound realtime event demultiplexed to local subscribers.
    SocketEvent { event: String, args: Value },
    /// Correlated reply for an ack-expecting emission.
    SocketAck { id: u64, args: Value },
}

impl HostBound {
    /// Returns the event name for emissions, used in delivery logging.
    pub fn event_name(&self) -> Option<&str> {
        match self {
            HostBound::SocketEmit { event, .. } => Some(event),
            HostBound::SocketConnect => None,
        }
    }
}
