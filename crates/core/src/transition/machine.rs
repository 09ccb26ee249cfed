//! Per-tab playback transition state machine.
//!
//! Consumes page-reported lifecycle signals and produces effect descriptions.
//! Every transition-performing path for a tab shares that tab's end-race
//! guard, so duplicate or racing signals (ended vs. closed, ad-skip vs.
//! ended) fire at most one advance.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use super::decision::{
    Decision, Effect, PlaybackState, Snapshot, decide_on_ad_started, decide_on_closed,
    decide_on_ended, decide_on_playing,
};
use super::race::EndWatch;
use crate::tabs::TabId;

/// Signal facts supplied by the coordinator; the machine adds its own state
/// and ad flag before deciding.
#[derive(Debug, Clone)]
pub struct SignalInput<'a> {
    pub tab_id: TabId,
    pub url: &'a str,
    pub is_playlist: bool,
    pub auto_advance_enabled: bool,
    pub opened_by_extension: bool,
    pub successor: Option<&'a str>,
}

#[derive(Default)]
struct TabPlayback {
    state: PlaybackState,
    ad_active: bool,
    watch: Option<EndWatch>,
}

/// Transition state for all tracked tabs.
pub struct TransitionMachine {
    tabs: HashMap<TabId, TabPlayback>,
    open_in_flight: bool,
    wait_timeout: Duration,
}

impl TransitionMachine {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            tabs: HashMap::new(),
            open_in_flight: false,
            wait_timeout,
        }
    }

    pub fn state(&self, tab_id: TabId) -> PlaybackState {
        self.tabs.get(&tab_id).map(|t| t.state).unwrap_or_default()
    }

    pub fn ad_active(&self, tab_id: TabId) -> bool {
        self.tabs.get(&tab_id).is_some_and(|t| t.ad_active)
    }

    /// The page reported natural end of content.
    pub fn on_video_ended(&mut self, input: &SignalInput<'_>) -> Vec<Effect> {
        let decision = decide_on_ended(&self.snapshot(input));
        self.apply(input.tab_id, decision, true)
    }

    /// The tab was closed, or navigated off watch content, while its end was
    /// awaited. Advances only if this tab's race was armed and unclaimed.
    pub fn on_tab_closed(&mut self, input: &SignalInput<'_>) -> Vec<Effect> {
        let Some(tab) = self.tabs.remove(&input.tab_id) else {
            return Vec::new();
        };
        let won = tab.watch.as_ref().is_some_and(EndWatch::try_claim);
        if !won {
            return Vec::new();
        }
        let snapshot = Snapshot {
            tab_id: input.tab_id,
            state: tab.state,
            url: input.url,
            ad_active: tab.ad_active,
            is_playlist: input.is_playlist,
            auto_advance_enabled: input.auto_advance_enabled,
            opened_by_extension: input.opened_by_extension,
            successor: input.successor,
        };
        decide_on_closed(&snapshot).effects
    }

    /// Advertisement state flipped for this tab.
    pub fn on_ad_state(&mut self, input: &SignalInput<'_>, is_ad: bool, near_end: bool) -> Vec<Effect> {
        self.tabs.entry(input.tab_id).or_default().ad_active = is_ad;
        if !is_ad {
            return Vec::new();
        }
        let decision = decide_on_ad_started(&self.snapshot(input), near_end);
        if decision.effects.is_empty() {
            return Vec::new();
        }
        debug!(target: "tp.transition", tab_id = input.tab_id, "blocking advertisement; advancing instead of waiting");
        self.apply(input.tab_id, decision, true)
    }

    /// The page explicitly asked to skip past an advertisement to the next
    /// item.
    pub fn on_skip_request(&mut self, input: &SignalInput<'_>) -> Vec<Effect> {
        let decision = decide_on_ad_started(&self.snapshot(input), true);
        self.apply(input.tab_id, decision, true)
    }

    /// A tab reported playback started. Re-arms the end race for it.
    pub fn on_playing(&mut self, input: &SignalInput<'_>) -> Vec<Effect> {
        let decision = decide_on_playing(&self.snapshot(input));
        let effects = self.apply(input.tab_id, decision, false);
        if let Some(tab) = self.tabs.get_mut(&input.tab_id) {
            tab.watch = Some(EndWatch::start(self.wait_timeout));
        }
        effects
    }

    /// Records a tab the coordinator just opened for the next item, arming
    /// its race so a close-before-play still resolves the wait.
    pub fn note_opened(&mut self, tab_id: TabId) {
        let tab = self.tabs.entry(tab_id).or_default();
        tab.state = PlaybackState::WaitingForNext;
        tab.watch = Some(EndWatch::start(self.wait_timeout));
    }

    /// Single-flight guard around tab creation/navigation.
    pub fn begin_open(&mut self) -> bool {
        if self.open_in_flight {
            debug!(target: "tp.transition", "open-next already in flight; skipping");
            return false;
        }
        self.open_in_flight = true;
        true
    }

    /// Releases the open guard. Called on success and on failure, so a
    /// failed navigation never blocks future attempts.
    pub fn finish_open(&mut self) {
        self.open_in_flight = false;
    }

    fn snapshot<'a>(&self, input: &SignalInput<'a>) -> Snapshot<'a> {
        Snapshot {
            tab_id: input.tab_id,
            state: self.state(input.tab_id),
            url: input.url,
            ad_active: self.ad_active(input.tab_id),
            is_playlist: input.is_playlist,
            auto_advance_enabled: input.auto_advance_enabled,
            opened_by_extension: input.opened_by_extension,
            successor: input.successor,
        }
    }

    /// Applies a decision, optionally gated by the tab's end race.
    fn apply(&mut self, tab_id: TabId, decision: Decision, claim_race: bool) -> Vec<Effect> {
        if decision.next_state.is_none() && decision.effects.is_empty() {
            return Vec::new();
        }
        if claim_race && !self.claim_end(tab_id) {
            return Vec::new();
        }
        if let Some(next) = decision.next_state {
            self.tabs.entry(tab_id).or_default().state = next;
        }
        decision.effects
    }

    fn claim_end(&mut self, tab_id: TabId) -> bool {
        let tab = self.tabs.entry(tab_id).or_default();
        match &tab.watch {
            Some(watch) => watch.try_claim(),
            None => {
                // No race was armed (signal for a tab we never saw play);
                // arm-and-claim so duplicates still dedupe.
                let watch = EndWatch::start(self.wait_timeout);
                let won = watch.try_claim();
                tab.watch = Some(watch);
                won
            }
        }
    }
}
