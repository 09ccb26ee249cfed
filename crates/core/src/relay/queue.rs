//! Outbound buffering while the relay host is not ready.
//!
//! Two disjoint collections, per the memory bounds in the coordinator's
//! design: fire-and-forget emissions coalesce by event name (only the latest
//! value matters), and ack-expecting emissions queue in order with a hard cap.
//! Overflow evicts the oldest entry and fails its waiting caller explicitly.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{Error, Result};

/// One ack-expecting emission waiting for readiness.
pub(crate) struct PendingAck {
    pub event: String,
    pub args: Value,
    pub reply: oneshot::Sender<Result<Value>>,
}

/// Buffered outbound messages awaiting the readiness flush.
pub(crate) struct PendingOutbound {
    coalesced: HashMap<String, Value>,
    ordered: VecDeque<PendingAck>,
    cap: usize,
}

impl PendingOutbound {
    pub fn new(cap: usize) -> Self {
        Self {
            coalesced: HashMap::new(),
            ordered: VecDeque::new(),
            cap,
        }
    }

    /// Buffers a fire-and-forget emission, replacing any unsent message for
    /// the same event.
    pub fn coalesce(&mut self, event: &str, args: Value) {
        self.coalesced.insert(event.to_string(), args);
    }

    /// Appends an ack-expecting emission, evicting the oldest entry when the
    /// bound is hit. The evicted caller is failed, never silently dropped.
    pub fn push_ordered(&mut self, pending: PendingAck) {
        if self.ordered.len() >= self.cap {
            if let Some(evicted) = self.ordered.pop_front() {
                warn!(
                    target: "tp.proxy",
                    event = %evicted.event,
                    cap = self.cap,
                    "ordered-ack queue full; evicting oldest emission"
                );
                let _ = evicted.reply.send(Err(Error::AckQueueFull));
            }
        }
        self.ordered.push_back(pending);
    }

    /// Drains both collections for a flush.
    pub fn drain(&mut self) -> (Vec<(String, Value)>, Vec<PendingAck>) {
        let coalesced = self.coalesced.drain().collect();
        let ordered = self.ordered.drain(..).collect();
        (coalesced, ordered)
    }

    pub fn is_empty(&self) -> bool {
        self.coalesced.is_empty() && self.ordered.is_empty()
    }
}
