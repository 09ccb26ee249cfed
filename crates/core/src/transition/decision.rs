//! Pure transition decisions.
//!
//! Each function takes a snapshot of the facts relevant to one signal and
//! returns effect descriptions; the coordinator performs the tab/relay I/O.
//! Keeping these free of side effects makes the state machine testable
//! without any runtime seams.

use crate::tabs::TabId;

/// Per-tab playback transition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Playing,
    Ended,
    WaitingForNext,
}

/// Facts a decision is made from.
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub tab_id: TabId,
    pub state: PlaybackState,
    pub url: &'a str,
    pub ad_active: bool,
    pub is_playlist: bool,
    pub auto_advance_enabled: bool,
    pub opened_by_extension: bool,
    pub successor: Option<&'a str>,
}

/// Side effects a decision requests.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Tell the backend the current video finished.
    EmitVideoEnded { url: String },
    /// Open or navigate a tab to the next queued item.
    OpenNext { next_url: String },
    /// No successor: show the end-of-queue indication and persist the
    /// `"ended"` sentinel.
    EndOfQueue { tab_id: TabId },
    /// Ask the page to report when playback finishes.
    RequestWaitForEnd { tab_id: TabId },
    /// Record this tab as the active playback source.
    ClaimActivePlayback { tab_id: TabId },
}

/// A decision: the state the tab should move to (if any) plus effects.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub next_state: Option<PlaybackState>,
    pub effects: Vec<Effect>,
}

impl Decision {
    pub fn none() -> Self {
        Self {
            next_state: None,
            effects: Vec::new(),
        }
    }
}

/// The page reported its video reached a natural end.
///
/// Suppressed while an advertisement is active (ad playback is not "the
/// end") and for playlist tabs, whose succession the page handles itself.
pub fn decide_on_ended(snapshot: &Snapshot<'_>) -> Decision {
    if snapshot.is_playlist || snapshot.ad_active {
        return Decision::none();
    }
    let mut decision = advance(snapshot);
    decision
        .effects
        .insert(0, Effect::EmitVideoEnded { url: snapshot.url.to_string() });
    decision
}

/// The tab closed (or navigated off watch content) while we were waiting
/// for its end.
pub fn decide_on_closed(snapshot: &Snapshot<'_>) -> Decision {
    if snapshot.is_playlist {
        return Decision::none();
    }
    advance(snapshot)
}

/// An advertisement began. Blocking when the transition is already under way
/// or the content is nearly over; a blocking ad is skipped by advancing
/// immediately instead of waiting it out.
pub fn decide_on_ad_started(snapshot: &Snapshot<'_>, near_end: bool) -> Decision {
    if snapshot.is_playlist {
        return Decision::none();
    }
    let blocking = matches!(
        snapshot.state,
        PlaybackState::Ended | PlaybackState::WaitingForNext
    ) || near_end;
    if !blocking {
        return Decision::none();
    }
    advance(snapshot)
}

/// A tab reported it began playing.
pub fn decide_on_playing(snapshot: &Snapshot<'_>) -> Decision {
    if snapshot.is_playlist {
        return Decision::none();
    }
    let mut effects = vec![Effect::RequestWaitForEnd { tab_id: snapshot.tab_id }];
    if snapshot.opened_by_extension {
        effects.push(Effect::ClaimActivePlayback { tab_id: snapshot.tab_id });
    }
    Decision {
        next_state: Some(PlaybackState::Playing),
        effects,
    }
}

fn advance(snapshot: &Snapshot<'_>) -> Decision {
    if !snapshot.auto_advance_enabled {
        return Decision {
            next_state: Some(PlaybackState::Ended),
            effects: Vec::new(),
        };
    }
    match snapshot.successor {
        Some(next_url) => Decision {
            next_state: Some(PlaybackState::WaitingForNext),
            effects: vec![Effect::OpenNext { next_url: next_url.to_string() }],
        },
        None => Decision {
            next_state: Some(PlaybackState::Ended),
            effects: vec![Effect::EndOfQueue { tab_id: snapshot.tab_id }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot<'static> {
        Snapshot {
            tab_id: 1,
            state: PlaybackState::Playing,
            url: "https://example.com/watch?v=v1",
            ad_active: false,
            is_playlist: false,
            auto_advance_enabled: true,
            opened_by_extension: true,
            successor: Some("https://example.com/watch?v=v2"),
        }
    }

    #[test]
    fn ended_with_successor_opens_next() {
        let decision = decide_on_ended(&snapshot());
        assert_eq!(decision.next_state, Some(PlaybackState::WaitingForNext));
        assert!(matches!(decision.effects[0], Effect::EmitVideoEnded { .. }));
        assert!(
            decision
                .effects
                .iter()
                .any(|e| matches!(e, Effect::OpenNext { next_url } if next_url.ends_with("v=v2")))
        );
    }

    #[test]
    fn ended_during_ad_is_suppressed() {
        let mut s = snapshot();
        s.ad_active = true;
        assert_eq!(decide_on_ended(&s), Decision::none());
    }

    #[test]
    fn ended_without_successor_ends_the_queue() {
        let mut s = snapshot();
        s.successor = None;
        let decision = decide_on_ended(&s);
        assert_eq!(decision.next_state, Some(PlaybackState::Ended));
        assert!(
            decision
                .effects
                .iter()
                .any(|e| matches!(e, Effect::EndOfQueue { tab_id: 1 }))
        );
    }

    #[test]
    fn playlist_tabs_are_exempt_everywhere() {
        let mut s = snapshot();
        s.is_playlist = true;
        assert_eq!(decide_on_ended(&s), Decision::none());
        assert_eq!(decide_on_closed(&s), Decision::none());
        assert_eq!(decide_on_ad_started(&s, true), Decision::none());
        assert_eq!(decide_on_playing(&s), Decision::none());
    }

    #[test]
    fn disabled_auto_advance_still_marks_ended() {
        let mut s = snapshot();
        s.auto_advance_enabled = false;
        let decision = decide_on_ended(&s);
        assert_eq!(decision.next_state, Some(PlaybackState::Ended));
        // The end is reported upstream, but nothing opens.
        assert_eq!(decision.effects.len(), 1);
        assert!(matches!(decision.effects[0], Effect::EmitVideoEnded { .. }));
    }

    #[test]
    fn mid_content_ad_is_not_blocking() {
        let s = snapshot();
        assert_eq!(decide_on_ad_started(&s, false), Decision::none());
    }

    #[test]
    fn near_end_ad_forces_advance() {
        let decision = decide_on_ad_started(&snapshot(), true);
        assert!(
            decision
                .effects
                .iter()
                .any(|e| matches!(e, Effect::OpenNext { .. }))
        );
    }

    #[test]
    fn ad_during_wait_forces_advance() {
        let mut s = snapshot();
        s.state = PlaybackState::WaitingForNext;
        let decision = decide_on_ad_started(&s, false);
        assert!(
            decision
                .effects
                .iter()
                .any(|e| matches!(e, Effect::OpenNext { .. }))
        );
    }

    #[test]
    fn playing_from_extension_tab_claims_playback() {
        let decision = decide_on_playing(&snapshot());
        assert_eq!(decision.next_state, Some(PlaybackState::Playing));
        assert!(
            decision
                .effects
                .iter()
                .any(|e| matches!(e, Effect::ClaimActivePlayback { tab_id: 1 }))
        );
    }
}
