//! User-facing command identifiers (keyboard shortcuts, menu entries).

/// Playback commands a user can issue from outside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePlayPause,
    NextVideo,
}

impl Command {
    /// Maps a registered command identifier to its command, `None` for
    /// identifiers this build does not handle.
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "toggle-play-pause" => Some(Self::TogglePlayPause),
            "next-video" => Some(Self::NextVideo),
            _ => None,
        }
    }
}
