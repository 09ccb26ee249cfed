//! In-memory fakes for the coordinator's collaborator seams.
//!
//! Mirrors the controller pattern used for transport testing: each fake
//! returns a handle for injecting behavior and inspecting what the
//! coordinator did, so unit and integration tests run without a browser or a
//! relay host.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tp_protocol::{HostBound, PageCommand, VideoPlayState};

use crate::browser::{PageChannel, TabRuntime};
use crate::error::{Error, Result};
use crate::relay::lifecycle::HostRuntime;
use crate::relay::proxy::RelayPort;
use crate::tabs::TabId;

/// Relay port fake capturing delivered envelopes.
pub struct FakeRelayPort {
    state: Arc<PortState>,
}

/// Injection/inspection handle for [`FakeRelayPort`].
#[derive(Clone)]
pub struct FakePortController {
    state: Arc<PortState>,
}

struct PortState {
    sent: Mutex<Vec<HostBound>>,
    no_receiver_remaining: AtomicU32,
    fail_message: Mutex<Option<String>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<HostBound>>>,
}

impl FakeRelayPort {
    pub fn new() -> (Self, FakePortController) {
        let state = Arc::new(PortState {
            sent: Mutex::new(Vec::new()),
            no_receiver_remaining: AtomicU32::new(0),
            fail_message: Mutex::new(None),
            watchers: Mutex::new(Vec::new()),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            FakePortController { state },
        )
    }
}

impl FakePortController {
    /// Fails the next `count` deliveries with the "no receiver" class.
    pub fn drop_next_deliveries(&self, count: u32) {
        self.state
            .no_receiver_remaining
            .store(count, Ordering::SeqCst);
    }

    /// Fails every delivery with a non-receiver transport error.
    pub fn fail_with(&self, message: &str) {
        *self.state.fail_message.lock() = Some(message.to_string());
    }

    /// Restores normal delivery.
    pub fn heal(&self) {
        *self.state.fail_message.lock() = None;
        self.state.no_receiver_remaining.store(0, Ordering::SeqCst);
    }

    /// Takes all delivered envelopes, clearing the buffer.
    pub fn take_sent(&self) -> Vec<HostBound> {
        std::mem::take(&mut *self.state.sent.lock())
    }

    /// Streams every delivered envelope as it arrives.
    pub fn watch_sent(&self) -> mpsc::UnboundedReceiver<HostBound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.watchers.lock().push(tx);
        rx
    }
}

#[async_trait]
impl RelayPort for FakeRelayPort {
    async fn deliver(&self, message: HostBound) -> Result<()> {
        if self
            .state
            .no_receiver_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::NoReceiver);
        }
        if let Some(message) = self.state.fail_message.lock().clone() {
            return Err(Error::Transport(message));
        }
        self.state.sent.lock().push(message.clone());
        self.state
            .watchers
            .lock()
            .retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }
}

/// Host runtime fake with probe/creation counters.
#[derive(Default)]
pub struct FakeHostRuntime {
    pub exists: AtomicBool,
    pub probes: AtomicU32,
    pub creations: AtomicU32,
}

impl FakeHostRuntime {
    /// A host that already exists, for tests exercising only the proxy.
    pub fn present() -> Arc<Self> {
        let host = Self::default();
        host.exists.store(true, Ordering::SeqCst);
        Arc::new(host)
    }
}

#[async_trait]
impl HostRuntime for FakeHostRuntime {
    async fn exists(&self) -> Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.exists.load(Ordering::SeqCst))
    }

    async fn create(&self, _document: &str) -> Result<()> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        self.exists.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Tab runtime fake tracking every manipulation.
#[derive(Default)]
pub struct FakeTabRuntime {
    tabs: Mutex<HashMap<TabId, String>>,
    next_id: AtomicI64,
    created: Mutex<Vec<(TabId, String)>>,
    updated: Mutex<Vec<(TabId, String)>>,
    removed: Mutex<Vec<TabId>>,
    fail_next_create: AtomicBool,
}

impl FakeTabRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(100),
            ..Default::default()
        })
    }

    /// Seeds a pre-existing tab, as if the user opened it.
    pub fn seed_tab(&self, url: &str) -> TabId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.tabs.lock().insert(id, url.to_string());
        id
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<(TabId, String)> {
        self.created.lock().clone()
    }

    pub fn updated(&self) -> Vec<(TabId, String)> {
        self.updated.lock().clone()
    }

    pub fn removed(&self) -> Vec<TabId> {
        self.removed.lock().clone()
    }

    pub fn url_of(&self, tab_id: TabId) -> Option<String> {
        self.tabs.lock().get(&tab_id).cloned()
    }
}

#[async_trait]
impl TabRuntime for FakeTabRuntime {
    async fn create_tab(&self, url: &str) -> Result<TabId> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(Error::Tab("create refused".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.tabs.lock().insert(id, url.to_string());
        self.created.lock().push((id, url.to_string()));
        Ok(id)
    }

    async fn update_tab(&self, tab_id: TabId, url: &str) -> Result<()> {
        let mut tabs = self.tabs.lock();
        match tabs.get_mut(&tab_id) {
            Some(existing) => {
                *existing = url.to_string();
                self.updated.lock().push((tab_id, url.to_string()));
                Ok(())
            }
            None => Err(Error::Tab(format!("no tab {tab_id}"))),
        }
    }

    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<()> {
        let mut tabs = self.tabs.lock();
        for id in tab_ids {
            tabs.remove(id);
            self.removed.lock().push(*id);
        }
        Ok(())
    }

    async fn query_tabs(&self, url_pattern: &str) -> Result<Vec<(TabId, String)>> {
        Ok(self
            .tabs
            .lock()
            .iter()
            .filter(|(_, url)| url.contains(url_pattern))
            .map(|(id, url)| (*id, url.clone()))
            .collect())
    }
}

/// Page channel fake recording commands per tab.
#[derive(Default)]
pub struct FakePageChannel {
    sent: Mutex<Vec<(TabId, PageCommand)>>,
    states: Mutex<HashMap<TabId, VideoPlayState>>,
    failing_tabs: Mutex<Vec<TabId>>,
}

impl FakePageChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes command delivery to `tab_id` fail, for per-sibling containment
    /// tests.
    pub fn fail_tab(&self, tab_id: TabId) {
        self.failing_tabs.lock().push(tab_id);
    }

    pub fn set_video_state(&self, tab_id: TabId, state: VideoPlayState) {
        self.states.lock().insert(tab_id, state);
    }

    pub fn sent(&self) -> Vec<(TabId, PageCommand)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, tab_id: TabId) -> Vec<PageCommand> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == tab_id)
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }
}

#[async_trait]
impl PageChannel for FakePageChannel {
    async fn send(&self, tab_id: TabId, command: PageCommand) -> Result<()> {
        if self.failing_tabs.lock().contains(&tab_id) {
            return Err(Error::Page(format!("tab {tab_id} unreachable")));
        }
        self.sent.lock().push((tab_id, command));
        Ok(())
    }

    async fn video_state(&self, tab_id: TabId) -> Result<VideoPlayState> {
        if self.failing_tabs.lock().contains(&tab_id) {
            return Err(Error::Page(format!("tab {tab_id} unreachable")));
        }
        self.sent.lock().push((tab_id, PageCommand::GetVideoState));
        Ok(self
            .states
            .lock()
            .get(&tab_id)
            .copied()
            .unwrap_or(VideoPlayState::Paused))
    }
}
