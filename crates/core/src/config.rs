//! Coordinator tunables.

use std::time::Duration;

/// Timing and capacity parameters for the coordinator.
///
/// Defaults match the shipped extension. `near_end` is a tuned heuristic, not
/// a contract; callers may override it.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// TTL for cached relay-host existence probes.
    pub exists_cache_ttl: Duration,
    /// Minimum spacing between relay-host creation attempts.
    pub create_throttle: Duration,
    /// Candidate relay documents, tried in order (primary layout first).
    pub relay_documents: Vec<String>,
    /// Maximum delivery attempts per relay message.
    pub delivery_attempts: u32,
    /// Wait between delivery attempts after a "no receiver" failure.
    pub delivery_retry_delay: Duration,
    /// Bound on the ordered-ack queue.
    pub ack_queue_cap: usize,
    /// Deadline for a correlated ack reply once sent.
    pub ack_timeout: Duration,
    /// TTL on the active-playback claim.
    pub claim_ttl: Duration,
    /// Remaining time under which an advertisement is treated as blocking
    /// the transition to the next item.
    pub near_end: Duration,
    /// Bound on the wait-for-end race before its listeners are deregistered.
    pub wait_for_end_timeout: Duration,
    /// Substring identifying watch-page URLs.
    pub watch_url_pattern: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            exists_cache_ttl: Duration::from_secs(2),
            create_throttle: Duration::from_millis(1500),
            relay_documents: vec!["offscreen/relay.html".into(), "relay.html".into()],
            delivery_attempts: 5,
            delivery_retry_delay: Duration::from_millis(200),
            ack_queue_cap: 50,
            ack_timeout: Duration::from_secs(15),
            claim_ttl: Duration::from_secs(60),
            near_end: Duration::from_secs(4),
            wait_for_end_timeout: Duration::from_secs(600),
            watch_url_pattern: "/watch".into(),
        }
    }
}
