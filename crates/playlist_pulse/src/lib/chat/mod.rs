pub mod matrix;

use std::future::Future;

/// A single room message delivered by the chat service.
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub sender: String,
    pub body: String,
    /// Server timestamp, milliseconds since the epoch.
    pub timestamp_ms: i64,
}

/// One sync response worth of room messages plus the cursor to resume from.
#[derive(Debug, Clone)]
pub struct MessageBatch {
    pub messages: Vec<RoomMessage>,
    pub next_cursor: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("response decode error: {0}")]
    Decode(#[from] reqwest::Error),
    #[error("chat API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// A live subscription to one chat room. The Matrix implementation long-polls
/// the homeserver; tests substitute a scripted fake.
pub trait ChatSource {
    /// Waits for the next batch of room messages after `cursor`. A `None`
    /// cursor starts from the server's current position.
    fn next_batch(
        &self,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<MessageBatch, ChatError>> + Send;

    /// Fetches one page of room history going backwards from `from`. Returns
    /// the page plus the token for the next older page, `None` once the
    /// history is exhausted.
    fn history_page(
        &self,
        from: &str,
    ) -> impl Future<Output = Result<(Vec<RoomMessage>, Option<String>), ChatError>> + Send;

    /// Posts a text message to the room.
    fn post(&self, body: &str) -> impl Future<Output = Result<(), ChatError>> + Send;

    /// The fully-qualified user the chat service knows this bot as.
    fn user_id(&self) -> &str;
}
