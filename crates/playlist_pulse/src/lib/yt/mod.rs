pub mod client;

use std::{future::Future, time::Duration};

/// Category id YouTube assigns to music videos.
pub const MUSIC_CATEGORY_ID: &str = "10";

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("response decode error: {0}")]
    Decode(#[from] reqwest::Error),
    #[error("credential error: {0}")]
    Credential(#[from] crate::auth::AuthError),
    #[error("authentication rejected by the video service: {0}")]
    Auth(String),
    #[error("rate limited by the video service")]
    RateLimited { retry_after: Option<Duration> },
    #[error("video {0} does not exist or is no longer available")]
    InvalidVideo(String),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Minimal video metadata used for publish-time validity checks.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub category_id: String,
}

/// The remote playlist surface the publisher drives. One implementation
/// speaks the YouTube Data API; tests substitute an in-memory fake.
pub trait PlaylistHost {
    /// Resolves an existing playlist by exact title.
    fn find_playlist(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<Option<String>, HostError>> + Send;

    /// Creates a playlist and returns its id.
    fn create_playlist(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<String, HostError>> + Send;

    /// Video ids currently present in the playlist, in playlist order.
    fn playlist_items(
        &self,
        playlist_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, HostError>> + Send;

    /// Appends one video to the end of the playlist.
    fn insert_item(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> impl Future<Output = Result<(), HostError>> + Send;

    /// Looks a video up; `None` means it does not exist or was removed.
    fn lookup_video(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<Option<VideoInfo>, HostError>> + Send;
}
