//! Background coordinator: routes page, tab, and backend signals through the
//! tracker and transition machine, then performs the resulting I/O.
//!
//! All decision-making happens under short non-async locks; effects are
//! collected first and executed after the locks drop, so no browser or relay
//! call ever runs while state is held.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, warn};
use tp_protocol::{BackendEvent, CoreBound, PageCommand, PageEvent, VideoPlayState, outbound};

use crate::browser::{PageChannel, TabRuntime};
use crate::commands::Command;
use crate::config::CoordinatorConfig;
use crate::relay::lifecycle::HostRuntime;
use crate::relay::proxy::{RelayPort, SocketProxy};
use crate::store::{LATEST_URL_ENDED, StateStore};
use crate::tabs::{TabId, TabTracker, TabUpdateOutcome};
use crate::transition::machine::{SignalInput, TransitionMachine};
use crate::transition::opener::NextOpener;
use crate::transition::Effect;
use crate::urls::{is_playlist_url, successor};

struct Playback {
    machine: TransitionMachine,
    /// (current_time, duration) per tab, from progress reports.
    progress: HashMap<TabId, (f64, f64)>,
}

/// The extension's background brain.
pub struct Coordinator<P, R> {
    proxy: SocketProxy<P, R>,
    tabs: Arc<dyn TabRuntime>,
    pages: Arc<dyn PageChannel>,
    store: Arc<dyn StateStore>,
    opener: NextOpener,
    tracker: Mutex<TabTracker>,
    playback: Mutex<Playback>,
    auto_advance: AtomicBool,
    config: CoordinatorConfig,
}

impl<P: RelayPort, R: HostRuntime> Coordinator<P, R> {
    pub fn new(
        proxy: SocketProxy<P, R>,
        tabs: Arc<dyn TabRuntime>,
        pages: Arc<dyn PageChannel>,
        store: Arc<dyn StateStore>,
        config: CoordinatorConfig,
    ) -> Self {
        let opener = NextOpener::new(
            Arc::clone(&tabs),
            Arc::clone(&pages),
            Arc::clone(&store),
            config.watch_url_pattern.clone(),
        );
        let machine = TransitionMachine::new(config.wait_for_end_timeout);
        Self {
            proxy,
            tabs,
            pages,
            store,
            opener,
            tracker: Mutex::new(TabTracker::new()),
            playback: Mutex::new(Playback {
                machine,
                progress: HashMap::new(),
            }),
            auto_advance: AtomicBool::new(true),
            config,
        }
    }

    pub fn proxy(&self) -> &SocketProxy<P, R> {
        &self.proxy
    }

    /// Opens the realtime connection through the relay.
    pub async fn connect(&self) {
        self.proxy.connect().await;
    }

    pub fn set_auto_advance(&self, enabled: bool) {
        self.auto_advance.store(enabled, Ordering::SeqCst);
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance.load(Ordering::SeqCst)
    }

    /// Entry point for everything arriving from the relay host document.
    ///
    /// Backend events the coordinator consumes are handled here; the message
    /// is then forwarded to the proxy for readiness/ack bookkeeping and any
    /// registered listeners.
    pub async fn handle_host_message(&self, message: CoreBound) {
        if let CoreBound::SocketEvent { event, args } = &message {
            self.handle_socket_event(event, args).await;
        }
        self.proxy.handle_host_message(message).await;
    }

    /// A notification arrived from a page's content script.
    pub async fn handle_page_event(&self, tab_id: TabId, event: PageEvent) {
        match event {
            PageEvent::VideoState { state, url } => self.on_video_state(tab_id, state, url).await,
            PageEvent::AdStateChanged { is_ad, url } => self.on_ad_state(tab_id, is_ad, url).await,
            PageEvent::AdSkipToNext { url } => self.on_skip(tab_id, &url).await,
            PageEvent::ProgressUpdate {
                url,
                current_time,
                duration,
            } => {
                self.playback
                    .lock()
                    .progress
                    .insert(tab_id, (current_time, duration));
                self.proxy
                    .emit(
                        outbound::PROGRESS_UPDATE,
                        json!({
                            "tabId": tab_id,
                            "url": url,
                            "currentTime": current_time,
                            "duration": duration,
                        }),
                    )
                    .await;
            }
        }
    }

    /// The browser reported a navigation (or creation) for `tab_id`.
    pub async fn handle_tab_updated(&self, tab_id: TabId, url: &str) {
        let (outcome, previous) = {
            let mut tracker = self.tracker.lock();
            let previous = tracker.last_known_url(tab_id).map(str::to_string);
            (
                tracker.record_tab_update(tab_id, url, &self.config.watch_url_pattern),
                previous,
            )
        };
        if outcome != TabUpdateOutcome::Demoted {
            return;
        }
        // Leaving watch content ends the wait exactly like a close; the
        // decision sees the URL the tab was on, not where it went.
        let watch_url = previous.unwrap_or_else(|| url.to_string());
        let effects = {
            let list = self.store.url_list();
            let input = self.signal_input(tab_id, &watch_url, &list);
            self.playback.lock().machine.on_tab_closed(&input)
        };
        self.run_effects(effects).await;
    }

    /// The browser reported `tab_id` closed.
    pub async fn handle_tab_removed(&self, tab_id: TabId) {
        let Some(url) = self.tracker.lock().last_known_url(tab_id).map(str::to_string) else {
            return;
        };
        self.proxy
            .emit(outbound::TAB_CLOSED, json!({"tabId": tab_id, "url": url}))
            .await;
        let effects = {
            let list = self.store.url_list();
            let input = self.signal_input(tab_id, &url, &list);
            let mut playback = self.playback.lock();
            playback.progress.remove(&tab_id);
            playback.machine.on_tab_closed(&input)
        };
        self.tracker.lock().record_tab_removed(tab_id);
        self.run_effects(effects).await;
    }

    /// A named realtime event arrived from the backend.
    pub async fn handle_socket_event(&self, event: &str, args: &Value) {
        let Some(parsed) = BackendEvent::parse(event, args) else {
            return;
        };
        match parsed {
            BackendEvent::NewUrl(url) => {
                debug!(target: "tp.proxy", %url, "backend set current url");
                self.store.set_latest_url(&url);
            }
            BackendEvent::UrlList(urls) => {
                debug!(target: "tp.proxy", count = urls.len(), "backend replaced queue snapshot");
                self.store.set_url_list(&urls);
            }
            BackendEvent::NextVideoNavigate(nav) => self.open_next(&nav.next_url).await,
            BackendEvent::NoNextVideo(event) => {
                self.store.set_latest_url(LATEST_URL_ENDED);
                let target = event.tab_id.or_else(|| {
                    self.tracker.lock().active_playback_tab(self.config.claim_ttl)
                });
                if let Some(tab_id) = target {
                    if let Err(err) = self.pages.send(tab_id, PageCommand::ShowVideoEndAlert).await
                    {
                        debug!(target: "tp.tabs", tab_id, error = %err, "end alert not delivered");
                    }
                }
            }
        }
    }

    /// Dispatches a user command to the tab currently playing.
    pub async fn handle_command(&self, command: Command) {
        let Some((target, url)) = self.command_target().await else {
            debug!(target: "tp.tabs", ?command, "no playback tab for command");
            return;
        };
        match command {
            Command::TogglePlayPause => {
                // Toggling a finished video would restart it from nothing.
                match self.pages.video_state(target).await {
                    Ok(VideoPlayState::Ended) => {
                        debug!(target: "tp.tabs", tab_id = target, "video already ended; toggle ignored");
                        return;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        debug!(target: "tp.tabs", tab_id = target, error = %err, "state probe failed; toggling anyway");
                    }
                }
                if let Err(err) = self.pages.send(target, PageCommand::TogglePlayPause).await {
                    warn!(target: "tp.tabs", tab_id = target, error = %err, "toggle command failed");
                }
            }
            Command::NextVideo => {
                let effects = {
                    let list = self.store.url_list();
                    let input = self.signal_input(target, &url, &list);
                    self.playback.lock().machine.on_skip_request(&input)
                };
                self.run_effects(effects).await;
            }
        }
    }

    /// The claim holder if one is live, otherwise the first open watch tab.
    async fn command_target(&self) -> Option<(TabId, String)> {
        {
            let tracker = self.tracker.lock();
            if let Some(tab_id) = tracker.active_playback_tab(self.config.claim_ttl) {
                if let Some(url) = tracker.last_known_url(tab_id) {
                    return Some((tab_id, url.to_string()));
                }
            }
        }
        match self.tabs.query_tabs(&self.config.watch_url_pattern).await {
            Ok(tabs) => tabs.into_iter().next(),
            Err(err) => {
                warn!(target: "tp.tabs", error = %err, "watch tab query failed");
                None
            }
        }
    }

    async fn on_video_state(&self, tab_id: TabId, state: VideoPlayState, url: String) {
        if state == VideoPlayState::Ended {
            // Ended never introduces a tab; an end for an untracked (usually
            // just-closed) tab would otherwise re-arm its race and advance a
            // second time.
            if self.tracker.lock().last_known_url(tab_id).is_none() {
                debug!(target: "tp.transition", tab_id, "ended for untracked tab; dropped");
                return;
            }
        } else {
            self.tracker
                .lock()
                .record_tab_update(tab_id, &url, &self.config.watch_url_pattern);
        }
        self.proxy
            .emit(
                outbound::YOUTUBE_VIDEO_STATE,
                json!({"tabId": tab_id, "state": state, "url": url}),
            )
            .await;
        let effects = {
            let list = self.store.url_list();
            let input = self.signal_input(tab_id, &url, &list);
            let mut playback = self.playback.lock();
            match state {
                VideoPlayState::Playing => playback.machine.on_playing(&input),
                VideoPlayState::Ended => playback.machine.on_video_ended(&input),
                VideoPlayState::Paused => Vec::new(),
            }
        };
        self.run_effects(effects).await;
    }

    async fn on_ad_state(&self, tab_id: TabId, is_ad: bool, url: String) {
        self.tracker
            .lock()
            .record_tab_update(tab_id, &url, &self.config.watch_url_pattern);
        self.proxy
            .emit(
                outbound::AD_STATE_CHANGED,
                json!({"tabId": tab_id, "isAd": is_ad, "url": url}),
            )
            .await;
        let effects = {
            let list = self.store.url_list();
            let input = self.signal_input(tab_id, &url, &list);
            let mut playback = self.playback.lock();
            let near_end = near_end(playback.progress.get(&tab_id), &self.config);
            playback.machine.on_ad_state(&input, is_ad, near_end)
        };
        self.run_effects(effects).await;
    }

    async fn on_skip(&self, tab_id: TabId, url: &str) {
        let effects = {
            let list = self.store.url_list();
            let input = self.signal_input(tab_id, url, &list);
            self.playback.lock().machine.on_skip_request(&input)
        };
        self.run_effects(effects).await;
    }

    fn signal_input<'a>(&self, tab_id: TabId, url: &'a str, list: &'a [String]) -> SignalInput<'a> {
        SignalInput {
            tab_id,
            url,
            is_playlist: is_playlist_url(url),
            auto_advance_enabled: self.auto_advance.load(Ordering::SeqCst),
            opened_by_extension: self.tracker.lock().opened_by_extension(tab_id),
            successor: successor(list, url),
        }
    }

    async fn run_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::EmitVideoEnded { url } => {
                    self.proxy
                        .emit(outbound::VIDEO_ENDED, json!({"url": url}))
                        .await;
                }
                Effect::OpenNext { next_url } => self.open_next(&next_url).await,
                Effect::EndOfQueue { tab_id } => {
                    self.store.set_latest_url(LATEST_URL_ENDED);
                    if let Err(err) =
                        self.pages.send(tab_id, PageCommand::ShowVideoEndAlert).await
                    {
                        debug!(target: "tp.tabs", tab_id, error = %err, "end alert not delivered");
                    }
                }
                Effect::RequestWaitForEnd { tab_id } => {
                    if let Err(err) = self.pages.send(tab_id, PageCommand::WaitForEnd).await {
                        debug!(target: "tp.tabs", tab_id, error = %err, "wait_for_end not delivered");
                    }
                }
                Effect::ClaimActivePlayback { tab_id } => {
                    self.tracker.lock().claim_active_playback(tab_id);
                }
            }
        }
    }

    async fn open_next(&self, next_url: &str) {
        if !self.playback.lock().machine.begin_open() {
            return;
        }
        match self.opener.open_next(&self.tracker, next_url).await {
            Ok(target) => {
                let mut playback = self.playback.lock();
                playback.machine.note_opened(target);
                playback.machine.finish_open();
            }
            Err(err) => {
                warn!(target: "tp.transition", %next_url, error = %err, "open next failed");
                self.playback.lock().machine.finish_open();
            }
        }
    }
}

fn near_end(progress: Option<&(f64, f64)>, config: &CoordinatorConfig) -> bool {
    progress.is_some_and(|&(current, duration)| {
        duration > 0.0 && duration - current <= config.near_end.as_secs_f64()
    })
}
