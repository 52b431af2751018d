use std::time::Duration;

/// A captured video reference. Order within a window is the order of
/// `Accumulator::add` calls, i.e. first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub video_id: String,
    /// Chat user that shared the link.
    pub sender: String,
}

impl VideoRef {
    pub fn new(video_id: impl Into<String>, sender: impl Into<String>) -> Self {
        VideoRef {
            video_id: video_id.into(),
            sender: sender.into(),
        }
    }
}

/// Whether the same video shared twice within one window appears once or
/// twice in the published playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DedupPolicy {
    /// Publish each video at most once per window.
    #[default]
    FirstSeenOnly,
    /// Forward repeats as-is; the playlist may contain duplicates.
    AllowRepeats,
}

/// What the scheduled flush does when nothing was accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EmptyWindowPolicy {
    /// No remote calls at all for an empty window.
    #[default]
    Skip,
    /// Still resolve or create the week's playlist.
    PublishEmpty,
}

/// Backoff schedule for rate-limited playlist writes.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Delay before the next attempt, doubling per attempt already made.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}
