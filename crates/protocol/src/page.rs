//! Page/content-script boundary types.

use serde::{Deserialize, Serialize};

/// Playback state as the page reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoPlayState {
    Playing,
    Paused,
    Ended,
}

/// Fire-and-forget notifications from the page to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    VideoState {
        state: VideoPlayState,
        url: String,
    },
    AdStateChanged {
        is_ad: bool,
        url: String,
    },
    /// The page decided an advertisement should not delay the queue.
    AdSkipToNext {
        url: String,
    },
    /// Informational only; forwarded to the backend, never consumed by the
    /// transition machine.
    ProgressUpdate {
        url: String,
        current_time: f64,
        duration: f64,
    },
}

/// Commands the coordinator sends into a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageCommand {
    TogglePlayPause,
    ForcePause,
    WaitForEnd,
    MarkExtensionOpened,
    GetVideoState,
    ShowVideoEndAlert,
}
