pub mod builder;

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;

use crate::{
    accumulator::Accumulator,
    chat::{ChatSource, RoomMessage},
    extractor::extract_video_ids,
    publisher::{PlaylistPublisher, PublishReport},
    types::{EmptyWindowPolicy, VideoRef},
    yt::{self, PlaylistHost},
};
use token_store::TokenStore;

const SYNC_CURSOR_KEY: &str = "sync_token";
const INTRO_COMMAND: &str = "!pulse";
const POTW_COMMAND: &str = "!potw";
/// Commands are only honored while the triggering message is fresh, so a
/// backfill or replayed history never answers stale requests.
const COMMAND_MAX_AGE_MS: i64 = 30_000;

/// Monday of the week containing `timestamp_ms`, in the given timezone.
fn week_start(timestamp_ms: i64, tz: Tz) -> NaiveDate {
    let utc = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
    let local = utc.with_timezone(&tz).date_naive();
    local - chrono::Duration::days(local.weekday().num_days_from_monday() as i64)
}

/// The whole system wired together: the chat listener feeding the
/// accumulator, and the scheduled flush feeding the publisher. Construct via
/// [`builder::PlaylistBotBuilder`].
pub struct PlaylistBot<C, H, S>
where
    C: ChatSource + Send + Sync + 'static,
    H: PlaylistHost + Send + Sync + 'static,
    S: TokenStore + Send + Sync + 'static,
{
    pub(crate) chat: C,
    pub(crate) publisher: PlaylistPublisher<H>,
    pub(crate) cursor_store: S,
    pub(crate) accumulator: Accumulator,
    pub(crate) base_title: String,
    pub(crate) timezone: Tz,
    pub(crate) empty_window: EmptyWindowPolicy,
    pub(crate) ack_links: bool,
    pub(crate) max_sync_retries: u32,
}

impl<C, H, S> PlaylistBot<C, H, S>
where
    C: ChatSource + Send + Sync + 'static,
    H: PlaylistHost + Send + Sync + 'static,
    S: TokenStore + Send + Sync + 'static,
{
    /// Title of the playlist for the week containing `timestamp_ms`.
    pub fn weekly_title(&self, timestamp_ms: i64) -> String {
        format!(
            "{} {}",
            self.base_title,
            week_start(timestamp_ms, self.timezone).format("%Y-%m-%d")
        )
    }

    /// Runs the sync loop until `shutdown` is cancelled. Transient sync
    /// failures are retried with capped backoff; exhausting the retries is
    /// fatal. The cursor is only advanced after a batch was handled, so a
    /// reconnect never reprocesses already-seen messages.
    #[tracing::instrument(skip_all)]
    pub async fn listen(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let mut cursor = self
            .cursor_store
            .load(SYNC_CURSOR_KEY)
            .await
            .context("Failed to load sync cursor")?;
        let mut failures = 0u32;

        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Listener shutting down");
                    return Ok(());
                }
                result = self.chat.next_batch(cursor.as_deref()) => result,
            };

            match batch {
                Ok(batch) => {
                    failures = 0;
                    for message in &batch.messages {
                        if let Err(e) = self.handle_message(message).await {
                            tracing::warn!(error = ?e, "Failed to handle message");
                        }
                    }
                    cursor = Some(batch.next_cursor.clone());
                    if let Err(e) = self
                        .cursor_store
                        .save(SYNC_CURSOR_KEY, &batch.next_cursor)
                        .await
                    {
                        // keep listening with the in-memory cursor; only a
                        // restart would reprocess
                        tracing::warn!(error = ?e, "Failed to persist sync cursor");
                    }
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.max_sync_retries {
                        return Err(e).context("Chat sync failed after repeated retries");
                    }
                    let delay = Duration::from_secs(2u64.pow(failures.min(5)));
                    tracing::warn!(
                        error = ?e,
                        failures,
                        delay_secs = delay.as_secs(),
                        "Chat sync failed, reconnecting"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Feeds the room's history through the message handler, paging backwards
    /// from the server's current position. The live sync cursor is untouched.
    #[tracing::instrument(skip_all)]
    pub async fn backfill(&self) -> anyhow::Result<()> {
        let start = self
            .chat
            .next_batch(None)
            .await
            .context("Initial sync for backfill failed")?;
        let mut from = start.next_cursor;

        loop {
            let (messages, end) = self
                .chat
                .history_page(&from)
                .await
                .context("Failed to fetch history page")?;
            tracing::debug!(count = messages.len(), "Processing history page");

            for message in &messages {
                if let Err(e) = self.handle_message(message).await {
                    tracing::warn!(error = ?e, "Failed to handle historical message");
                }
            }

            match end {
                Some(token) if token != from => from = token,
                _ => return Ok(()),
            }
        }
    }

    /// Handles one incoming room message: commands first, then link capture.
    #[tracing::instrument(skip(self, message), fields(sender = %message.sender))]
    pub async fn handle_message(&self, message: &RoomMessage) -> anyhow::Result<()> {
        if message.sender == self.chat.user_id() {
            return Ok(());
        }

        let body = message.body.trim();
        if let Some(reply) = self.command_reply(body, message.timestamp_ms).await {
            self.chat
                .post(&reply)
                .await
                .context("Failed to post command reply")?;
            return Ok(());
        }

        for video_id in extract_video_ids(body) {
            tracing::info!(%video_id, "Captured video link");
            self.accumulator
                .add(VideoRef::new(video_id.clone(), message.sender.clone()));
            if self.ack_links {
                let ack = format!("Queued {video_id} for this week's playlist.");
                if let Err(e) = self.chat.post(&ack).await {
                    tracing::warn!(error = ?e, "Failed to post link acknowledgment");
                }
            }
        }
        Ok(())
    }

    async fn command_reply(&self, body: &str, timestamp_ms: i64) -> Option<String> {
        if body != INTRO_COMMAND && body != POTW_COMMAND {
            return None;
        }
        if Utc::now().timestamp_millis() - timestamp_ms > COMMAND_MAX_AGE_MS {
            return None;
        }

        match body {
            INTRO_COMMAND => Some(
                "Hi, I'm playlist-pulse! I collect YouTube links posted here into a weekly playlist."
                    .to_string(),
            ),
            POTW_COMMAND => {
                let title = self.weekly_title(timestamp_ms);
                match self.publisher.resolve_existing(&title).await {
                    Ok(Some(playlist_id)) => Some(format!(
                        "Here's the playlist of the week: {}",
                        yt::playlist_url(&playlist_id)
                    )),
                    Ok(None) => Some(format!(
                        "No playlist yet for the week of {}.",
                        week_start(timestamp_ms, self.timezone).format("%Y-%m-%d")
                    )),
                    Err(e) => {
                        tracing::warn!(error = ?e, "Failed to look up the week's playlist");
                        None
                    }
                }
            }
            _ => None,
        }
    }

    /// The scheduled flush: drains the window and pushes it to the video
    /// service. On failure the batch is put back so a retried flush can pick
    /// it up again.
    #[tracing::instrument(skip(self))]
    pub async fn flush_and_publish(&self) -> anyhow::Result<Option<PublishReport>> {
        let refs = self.accumulator.flush();
        let title = self.weekly_title(Utc::now().timestamp_millis());

        if refs.is_empty() && self.empty_window == EmptyWindowPolicy::Skip {
            tracing::info!(%title, "Nothing accumulated this window, skipping publish");
            return Ok(None);
        }

        tracing::info!(%title, count = refs.len(), "Publishing accumulated links");
        match self.publisher.publish(&title, &refs).await {
            Ok(report) => {
                tracing::info!(
                    playlist_id = %report.playlist_id,
                    inserted = report.inserted,
                    already_present = report.already_present,
                    skipped = report.skipped,
                    "Publish complete"
                );
                Ok(Some(report))
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to publish playlist, requeueing batch");
                self.accumulator.restore(refs);
                Err(e).context("Failed to publish playlist")
            }
        }
    }
}
