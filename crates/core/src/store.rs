//! Durable key-value persistence for queue position recovery.
//!
//! Two fields survive a cold restart: the current URL (or the `"ended"`
//! sentinel) and the ordered queue snapshot. Writes happen synchronously at
//! every change so a restarted context can resume.

use parking_lot::Mutex;

/// Sentinel written to `latest_url` when the queue ran out, so a
/// subsequently queued item does not spuriously auto-play off stale state.
pub const LATEST_URL_ENDED: &str = "ended";

/// Persistence seam for the two recovered fields.
pub trait StateStore: Send + Sync {
    fn set_latest_url(&self, url: &str);
    fn latest_url(&self) -> Option<String>;
    fn set_url_list(&self, urls: &[String]);
    fn url_list(&self) -> Vec<String>;
}

/// In-memory store used by tests and as a default.
#[derive(Debug, Default)]
pub struct MemoryStore {
    latest_url: Mutex<Option<String>>,
    url_list: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn set_latest_url(&self, url: &str) {
        *self.latest_url.lock() = Some(url.to_string());
    }

    fn latest_url(&self) -> Option<String> {
        self.latest_url.lock().clone()
    }

    fn set_url_list(&self, urls: &[String]) {
        *self.url_list.lock() = urls.to_vec();
    }

    fn url_list(&self) -> Vec<String> {
        self.url_list.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_url_round_trips_with_sentinel() {
        let store = MemoryStore::new();
        assert_eq!(store.latest_url(), None);
        store.set_latest_url("https://example.com/watch?v=a");
        store.set_latest_url(LATEST_URL_ENDED);
        assert_eq!(store.latest_url().as_deref(), Some(LATEST_URL_ENDED));
    }

    #[test]
    fn url_list_snapshot_replaces_wholesale() {
        let store = MemoryStore::new();
        store.set_url_list(&["a".into(), "b".into()]);
        store.set_url_list(&["c".into()]);
        assert_eq!(store.url_list(), vec!["c".to_string()]);
    }
}
