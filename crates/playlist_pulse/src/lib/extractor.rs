//! # Link Extractor
//!
//! Recognizes YouTube video links inside arbitrary chat message bodies and
//! extracts their canonical video identifiers. Playlist links are not video
//! links and never match.

use std::sync::LazyLock;

use regex::Regex;

static YOUTUBE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:www\.|music\.)?youtube\.com/watch\?v=([\w-]+)|https?://youtu\.be/([\w-]+)",
    )
    .unwrap()
});

/// Extracts YouTube video identifiers from a message body, in the order they
/// appear. Non-matching text yields an empty result; absence of a link is a
/// normal outcome, not an error.
pub fn extract_video_ids(body: &str) -> Vec<String> {
    YOUTUBE_LINK_RE
        .captures_iter(body)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}
