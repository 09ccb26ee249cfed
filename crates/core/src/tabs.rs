//! Tab State Tracker: in-memory bookkeeping for tabs the coordinator cares
//! about.
//!
//! Pure bookkeeping, no I/O. All mutation happens from the single dispatch
//! thread, so the tracker is a plain struct behind the coordinator's lock.
//! The active-playback claim expires lazily on read; there is no sweep.

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::debug;

use crate::urls::is_watch_url;

/// Opaque tab identifier assigned by the browser runtime.
pub type TabId = i64;

/// Last-known facts about one tracked tab.
#[derive(Debug, Clone)]
pub struct TabRecord {
    pub last_known_url: String,
    /// True only while the tab was created by the coordinator to play a
    /// queued item and is still on watch content.
    pub opened_by_extension: bool,
}

/// Outcome of a navigation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabUpdateOutcome {
    Recorded,
    /// The tab was coordinator-owned but navigated off watch content; the
    /// transition machine should treat it like a close.
    Demoted,
}

#[derive(Debug, Clone, Copy)]
struct ActivePlaybackClaim {
    tab_id: TabId,
    claimed_at: Instant,
}

/// In-memory tab bookkeeping.
#[derive(Debug, Default)]
pub struct TabTracker {
    tabs: HashMap<TabId, TabRecord>,
    claim: Option<ActivePlaybackClaim>,
}

impl TabTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a navigation/creation signal for `tab_id`.
    ///
    /// Demotes a coordinator-owned tab whose new URL left the watch pattern.
    pub fn record_tab_update(
        &mut self,
        tab_id: TabId,
        url: &str,
        watch_pattern: &str,
    ) -> TabUpdateOutcome {
        let record = self.tabs.entry(tab_id).or_insert_with(|| TabRecord {
            last_known_url: String::new(),
            opened_by_extension: false,
        });
        record.last_known_url = url.to_string();

        if record.opened_by_extension && !is_watch_url(url, watch_pattern) {
            record.opened_by_extension = false;
            debug!(target: "tp.tabs", tab_id, %url, "extension tab left watch content; demoted");
            return TabUpdateOutcome::Demoted;
        }
        TabUpdateOutcome::Recorded
    }

    /// Destroys all state for `tab_id`, including the active claim if held.
    pub fn record_tab_removed(&mut self, tab_id: TabId) {
        self.tabs.remove(&tab_id);
        if self.claim.is_some_and(|claim| claim.tab_id == tab_id) {
            self.claim = None;
            debug!(target: "tp.tabs", tab_id, "active playback claim cleared on close");
        }
    }

    pub fn last_known_url(&self, tab_id: TabId) -> Option<&str> {
        self.tabs.get(&tab_id).map(|r| r.last_known_url.as_str())
    }

    /// Flags a tab the coordinator created to play a queued item.
    pub fn mark_opened_by_extension(&mut self, tab_id: TabId, url: &str) {
        let record = self.tabs.entry(tab_id).or_insert_with(|| TabRecord {
            last_known_url: url.to_string(),
            opened_by_extension: false,
        });
        record.last_known_url = url.to_string();
        record.opened_by_extension = true;
    }

    pub fn opened_by_extension(&self, tab_id: TabId) -> bool {
        self.tabs
            .get(&tab_id)
            .is_some_and(|r| r.opened_by_extension)
    }

    /// Tabs currently flagged as coordinator-owned.
    pub fn extension_tabs(&self) -> Vec<TabId> {
        self.tabs
            .iter()
            .filter(|(_, r)| r.opened_by_extension)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Asserts `tab_id` as the active playback source.
    pub fn claim_active_playback(&mut self, tab_id: TabId) {
        self.claim = Some(ActivePlaybackClaim {
            tab_id,
            claimed_at: Instant::now(),
        });
    }

    /// True while `tab_id` holds an unexpired claim.
    pub fn is_active_playback(&self, tab_id: TabId, ttl: std::time::Duration) -> bool {
        self.active_playback_tab(ttl) == Some(tab_id)
    }

    /// The claim holder, if the claim has not aged past `ttl`.
    pub fn active_playback_tab(&self, ttl: std::time::Duration) -> Option<TabId> {
        let claim = self.claim?;
        if claim.claimed_at.elapsed() > ttl {
            return None;
        }
        Some(claim.tab_id)
    }
}
