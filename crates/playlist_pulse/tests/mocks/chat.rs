use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use playlist_pulse::chat::{ChatError, ChatSource, MessageBatch, RoomMessage};
use tokio_util::sync::CancellationToken;

pub enum ScriptStep {
    Deliver(MessageBatch),
    Fail(String),
}

/// Scripted chat service: serves the scripted sync steps in order, then
/// cancels `on_exhausted` and blocks forever. Handing `on_exhausted` to the
/// listener as its shutdown token makes `listen` return cleanly once the
/// script is spent.
pub struct MockChat {
    pub script: Mutex<VecDeque<ScriptStep>>,
    pub history: Mutex<VecDeque<(Vec<RoomMessage>, Option<String>)>>,
    pub posted: Arc<Mutex<Vec<String>>>,
    pub sync_cursors: Arc<Mutex<Vec<Option<String>>>>,
    pub on_exhausted: CancellationToken,
    pub user: String,
}

impl MockChat {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            history: Mutex::new(VecDeque::new()),
            posted: Arc::new(Mutex::new(Vec::new())),
            sync_cursors: Arc::new(Mutex::new(Vec::new())),
            on_exhausted: CancellationToken::new(),
            user: "@playlist-pulse:example.org".to_string(),
        }
    }

    pub fn with_history(self, pages: Vec<(Vec<RoomMessage>, Option<String>)>) -> Self {
        Self {
            history: Mutex::new(pages.into()),
            ..self
        }
    }

    pub fn message(sender: &str, body: &str) -> RoomMessage {
        RoomMessage {
            sender: sender.to_string(),
            body: body.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn batch(messages: Vec<RoomMessage>, next_cursor: &str) -> MessageBatch {
        MessageBatch {
            messages,
            next_cursor: next_cursor.to_string(),
        }
    }
}

impl ChatSource for MockChat {
    async fn next_batch(&self, cursor: Option<&str>) -> Result<MessageBatch, ChatError> {
        self.sync_cursors
            .lock()
            .unwrap()
            .push(cursor.map(|c| c.to_string()));
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(ScriptStep::Deliver(batch)) => Ok(batch),
            Some(ScriptStep::Fail(message)) => Err(ChatError::Api {
                status: 502,
                message,
            }),
            None => {
                self.on_exhausted.cancel();
                std::future::pending().await
            }
        }
    }

    async fn history_page(
        &self,
        _from: &str,
    ) -> Result<(Vec<RoomMessage>, Option<String>), ChatError> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((Vec::new(), None)))
    }

    async fn post(&self, body: &str) -> Result<(), ChatError> {
        self.posted.lock().unwrap().push(body.to_string());
        Ok(())
    }

    fn user_id(&self) -> &str {
        &self.user
    }
}
