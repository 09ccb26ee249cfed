//! Realtime backend boundary: outbound event names and parsed inbound events.
//!
//! Outbound payload schemas are owned by the backend; the coordinator treats
//! them as opaque `Value`s and only names the events. Inbound events the
//! coordinator acts on are parsed into [`BackendEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound event names emitted through the relay.
pub mod outbound {
    pub const YOUTUBE_VIDEO_STATE: &str = "youtube_video_state";
    pub const VIDEO_ENDED: &str = "video_ended";
    pub const TAB_CLOSED: &str = "tab_closed";
    pub const AD_STATE_CHANGED: &str = "ad_state_changed";
    pub const PROGRESS_UPDATE: &str = "progress_update";
}

/// Inbound event names the coordinator subscribes to.
pub mod inbound {
    pub const NEW_URL: &str = "new_url";
    pub const URL_LIST: &str = "url_list";
    pub const NEXT_VIDEO_NAVIGATE: &str = "next_video_navigate";
    pub const NO_NEXT_VIDEO: &str = "no_next_video";
}

/// Parsed inbound realtime events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextVideoNavigate {
    pub next_url: String,
    pub tab_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoNextVideo {
    pub tab_id: Option<i64>,
}

/// Inbound realtime events the coordinator reacts to.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    NewUrl(String),
    UrlList(Vec<String>),
    NextVideoNavigate(NextVideoNavigate),
    NoNextVideo(NoNextVideo),
}

impl BackendEvent {
    /// Parses a named socket event into a backend event, returning `None`
    /// for events the coordinator does not consume.
    pub fn parse(event: &str, args: &Value) -> Option<BackendEvent> {
        match event {
            inbound::NEW_URL => args.as_str().map(|s| BackendEvent::NewUrl(s.to_string())),
            inbound::URL_LIST => {
                serde_json::from_value(args.clone()).ok().map(BackendEvent::UrlList)
            }
            inbound::NEXT_VIDEO_NAVIGATE => serde_json::from_value(args.clone())
                .ok()
                .map(BackendEvent::NextVideoNavigate),
            inbound::NO_NEXT_VIDEO => serde_json::from_value(args.clone())
                .ok()
                .map(BackendEvent::NoNextVideo),
            _ => None,
        }
    }
}
