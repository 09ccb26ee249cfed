//! Executes the open-next effect: tab reuse/creation, sibling pausing, and
//! queue-position persistence.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use tp_protocol::PageCommand;

use crate::browser::{PageChannel, TabRuntime};
use crate::error::Result;
use crate::store::StateStore;
use crate::tabs::{TabId, TabTracker};

/// Performs the tab side of a queue advance.
pub struct NextOpener {
    tabs: Arc<dyn TabRuntime>,
    pages: Arc<dyn PageChannel>,
    store: Arc<dyn StateStore>,
    watch_pattern: String,
}

impl NextOpener {
    pub fn new(
        tabs: Arc<dyn TabRuntime>,
        pages: Arc<dyn PageChannel>,
        store: Arc<dyn StateStore>,
        watch_pattern: String,
    ) -> Self {
        Self {
            tabs,
            pages,
            store,
            watch_pattern,
        }
    }

    /// Opens or navigates a tab to `next_url`.
    ///
    /// Reuses an existing coordinator-owned tab instead of accumulating new
    /// ones, marks the target opened-by-extension, pauses sibling watch tabs
    /// best-effort, and persists the new current URL for restart recovery.
    pub async fn open_next(&self, tracker: &Mutex<TabTracker>, next_url: &str) -> Result<TabId> {
        let owned = tracker.lock().extension_tabs();

        let target = match owned.split_first() {
            Some((&reuse, extra)) => {
                if !extra.is_empty() {
                    // Stray owned tabs from interrupted transitions.
                    if let Err(err) = self.tabs.remove_tabs(extra).await {
                        warn!(target: "tp.transition", error = %err, "failed to close stray extension tabs");
                    }
                }
                self.tabs.update_tab(reuse, next_url).await?;
                debug!(target: "tp.transition", tab_id = reuse, %next_url, "reused extension tab for next item");
                reuse
            }
            None => {
                let created = self.tabs.create_tab(next_url).await?;
                debug!(target: "tp.transition", tab_id = created, %next_url, "created tab for next item");
                created
            }
        };

        tracker.lock().mark_opened_by_extension(target, next_url);
        if let Err(err) = self.pages.send(target, PageCommand::MarkExtensionOpened).await {
            debug!(target: "tp.transition", tab_id = target, error = %err, "mark_extension_opened not delivered");
        }

        self.pause_siblings(target).await;
        self.store.set_latest_url(next_url);
        Ok(target)
    }

    /// Pauses every other watch tab. Failures are independent per sibling
    /// and never block the transition.
    async fn pause_siblings(&self, except: TabId) {
        let siblings = match self.tabs.query_tabs(&self.watch_pattern).await {
            Ok(tabs) => tabs,
            Err(err) => {
                warn!(target: "tp.transition", error = %err, "sibling query failed; skipping pause");
                return;
            }
        };
        for (tab_id, url) in siblings {
            if tab_id == except {
                continue;
            }
            if let Err(err) = self.pages.send(tab_id, PageCommand::ForcePause).await {
                warn!(target: "tp.transition", tab_id, %url, error = %err, "sibling pause failed");
            }
        }
    }
}
