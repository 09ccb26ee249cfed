//! Watch/playlist URL recognition helpers.

/// True if `url` points at a watch page per the configured pattern.
pub fn is_watch_url(url: &str, watch_pattern: &str) -> bool {
    url.contains(watch_pattern)
}

/// True if `url` carries a playlist identifier.
///
/// Playlist tabs are exempt from the auto-advance machinery; the page's own
/// playlist mechanism handles succession.
pub fn is_playlist_url(url: &str) -> bool {
    let Some(query) = url.splitn(2, '?').nth(1) else {
        return false;
    };
    query.split('&').any(|pair| {
        pair.strip_prefix("list=")
            .is_some_and(|value| !value.is_empty())
    })
}

/// Finds the successor of `current` in an ordered queue snapshot.
pub fn successor<'a>(urls: &'a [String], current: &str) -> Option<&'a str> {
    let index = urls.iter().position(|u| u == current)?;
    urls.get(index + 1).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_pattern_matches_substring() {
        assert!(is_watch_url("https://example.com/watch?v=abc", "/watch"));
        assert!(!is_watch_url("https://example.com/feed", "/watch"));
    }

    #[test]
    fn playlist_detection_requires_list_param() {
        assert!(is_playlist_url("https://example.com/watch?v=a&list=PL123"));
        assert!(!is_playlist_url("https://example.com/watch?v=a"));
        assert!(!is_playlist_url("https://example.com/watch?v=a&list="));
        assert!(!is_playlist_url("https://example.com/playlists"));
    }

    #[test]
    fn successor_walks_the_queue() {
        let queue = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(successor(&queue, "a"), Some("b"));
        assert_eq!(successor(&queue, "c"), None);
        assert_eq!(successor(&queue, "missing"), None);
    }
}
