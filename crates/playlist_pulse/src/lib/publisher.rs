//! # Playlist Publisher
//!
//! Pushes a flushed window of video references to the remote video service:
//! resolve-or-create the playlist for the window's title, then append
//! whatever is not already there. Re-publishing the same refs is a no-op, so
//! a partially failed cycle can simply be retried.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use itertools::Itertools;

use crate::{
    types::{DedupPolicy, RetryConfig, VideoRef},
    yt::{HostError, PlaylistHost, MUSIC_CATEGORY_ID},
};

/// Outcome of one publish cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub playlist_id: String,
    pub inserted: usize,
    pub already_present: usize,
    pub skipped: usize,
}

pub struct PlaylistPublisher<H: PlaylistHost> {
    host: H,
    dedup: DedupPolicy,
    music_only: bool,
    retry: RetryConfig,
    // playlist handles resolved during this process lifetime, keyed by title
    resolved: Mutex<HashMap<String, String>>,
}

impl<H: PlaylistHost + Send + Sync> PlaylistPublisher<H> {
    pub fn new(host: H) -> Self {
        PlaylistPublisher {
            host,
            dedup: DedupPolicy::default(),
            music_only: false,
            retry: RetryConfig::default(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_music_only(mut self, music_only: bool) -> Self {
        self.music_only = music_only;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolves the playlist for `title` if it already exists remotely,
    /// without creating it.
    pub async fn resolve_existing(&self, title: &str) -> Result<Option<String>, HostError> {
        if let Some(id) = self.resolved.lock().unwrap().get(title).cloned() {
            return Ok(Some(id));
        }
        let found = self.host.find_playlist(title).await?;
        if let Some(id) = &found {
            self.resolved
                .lock()
                .unwrap()
                .insert(title.to_string(), id.clone());
        }
        Ok(found)
    }

    async fn resolve_or_create(&self, title: &str) -> Result<String, HostError> {
        if let Some(id) = self.resolve_existing(title).await? {
            return Ok(id);
        }
        let id = self.host.create_playlist(title).await?;
        tracing::info!(%title, playlist_id = %id, "Created playlist");
        self.resolved
            .lock()
            .unwrap()
            .insert(title.to_string(), id.clone());
        Ok(id)
    }

    /// Ensures the playlist keyed by `title` contains every publishable ref
    /// in `refs`, in order. Items already present remotely are left alone, so
    /// re-running after a partial failure cannot duplicate them.
    #[tracing::instrument(skip(self, refs), fields(count = refs.len()))]
    pub async fn publish(
        &self,
        title: &str,
        refs: &[VideoRef],
    ) -> Result<PublishReport, HostError> {
        let playlist_id = self.resolve_or_create(title).await?;
        let present: HashSet<String> = self
            .host
            .playlist_items(&playlist_id)
            .await?
            .into_iter()
            .collect();

        let batch: Vec<&VideoRef> = match self.dedup {
            DedupPolicy::FirstSeenOnly => {
                refs.iter().unique_by(|r| r.video_id.as_str()).collect()
            }
            DedupPolicy::AllowRepeats => refs.iter().collect(),
        };

        let mut report = PublishReport {
            playlist_id: playlist_id.clone(),
            ..Default::default()
        };

        for video_ref in batch {
            let video_id = video_ref.video_id.as_str();
            if present.contains(video_id) {
                tracing::debug!(%video_id, "Already in playlist");
                report.already_present += 1;
                continue;
            }
            if !self.check_video(video_id).await? {
                report.skipped += 1;
                continue;
            }
            match self.insert_with_backoff(&playlist_id, video_id).await {
                Ok(()) => {
                    report.inserted += 1;
                    tracing::info!(%video_id, sender = %video_ref.sender, "Added track to playlist");
                }
                Err(HostError::InvalidVideo(id)) => {
                    tracing::warn!(video_id = %id, "Skipping unavailable video");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Publish-time validity (and optional category) gate.
    async fn check_video(&self, video_id: &str) -> Result<bool, HostError> {
        match self.host.lookup_video(video_id).await? {
            None => {
                tracing::warn!(%video_id, "Skipping unknown or removed video");
                Ok(false)
            }
            Some(info) if self.music_only && info.category_id != MUSIC_CATEGORY_ID => {
                tracing::debug!(%video_id, category = %info.category_id, "Skipping non-music video");
                Ok(false)
            }
            Some(_) => Ok(true),
        }
    }

    async fn insert_with_backoff(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<(), HostError> {
        let mut attempt = 0;
        loop {
            match self.host.insert_item(playlist_id, video_id).await {
                Err(HostError::RateLimited { retry_after })
                    if attempt + 1 < self.retry.max_attempts =>
                {
                    let delay = retry_after.unwrap_or_else(|| self.retry.delay_for(attempt));
                    tracing::warn!(
                        %video_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
