//! Seams for the browser tab/runtime and page collaborators.
//!
//! The coordinator never touches browser APIs directly; everything crosses
//! one of these traits so tests can run against in-memory fakes (see
//! [`crate::testing`]).

use async_trait::async_trait;
use tp_protocol::{PageCommand, VideoPlayState};

use crate::error::Result;
use crate::tabs::TabId;

/// Browser tab manipulation surface.
#[async_trait]
pub trait TabRuntime: Send + Sync {
    /// Creates a tab at `url` and returns its identifier.
    async fn create_tab(&self, url: &str) -> Result<TabId>;

    /// Navigates an existing tab to `url`.
    async fn update_tab(&self, tab_id: TabId, url: &str) -> Result<()>;

    /// Closes the given tabs.
    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<()>;

    /// Tabs whose URL contains `url_pattern`, with their current URLs.
    async fn query_tabs(&self, url_pattern: &str) -> Result<Vec<(TabId, String)>>;
}

/// Point-to-point channel into a tab's content script.
#[async_trait]
pub trait PageChannel: Send + Sync {
    /// Fire-and-forget command delivery.
    async fn send(&self, tab_id: TabId, command: PageCommand) -> Result<()>;

    /// Request/response playback-state probe.
    async fn video_state(&self, tab_id: TabId) -> Result<VideoPlayState>;
}
