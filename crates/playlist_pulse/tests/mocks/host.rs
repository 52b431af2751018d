use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use playlist_pulse::yt::{HostError, PlaylistHost, VideoInfo};

/// In-memory playlist host. Unknown videos look up as valid music unless
/// marked otherwise.
#[derive(Default)]
pub struct MockHost {
    pub playlists: Arc<Mutex<HashMap<String, String>>>,
    pub items: Arc<Mutex<HashMap<String, Vec<String>>>>,
    pub created: Arc<Mutex<Vec<String>>>,
    pub find_calls: Arc<Mutex<Vec<String>>>,
    pub insert_attempts: Arc<Mutex<Vec<String>>>,
    /// video id -> category override
    pub categories: HashMap<String, String>,
    /// videos that look up as gone
    pub invalid: HashSet<String>,
    /// videos that pass lookup but 404 on insert
    pub insert_invalid: HashSet<String>,
    /// video id -> number of rate-limit errors before an insert succeeds
    pub rate_limits: Mutex<HashMap<String, u32>>,
    pub fail_with: Option<String>,
    next_id: Mutex<u32>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        }
    }

    pub fn with_playlist(self, title: &str, playlist_id: &str) -> Self {
        self.playlists
            .lock()
            .unwrap()
            .insert(title.to_string(), playlist_id.to_string());
        self
    }

    pub fn with_invalid(mut self, video_id: &str) -> Self {
        self.invalid.insert(video_id.to_string());
        self
    }

    pub fn with_insert_invalid(mut self, video_id: &str) -> Self {
        self.insert_invalid.insert(video_id.to_string());
        self
    }

    pub fn with_category(mut self, video_id: &str, category: &str) -> Self {
        self.categories
            .insert(video_id.to_string(), category.to_string());
        self
    }

    pub fn with_rate_limits(self, video_id: &str, failures: u32) -> Self {
        self.rate_limits
            .lock()
            .unwrap()
            .insert(video_id.to_string(), failures);
        self
    }

    fn fail(&self) -> Option<HostError> {
        self.fail_with.as_ref().map(|msg| HostError::Api {
            status: 500,
            message: msg.clone(),
        })
    }
}

impl PlaylistHost for MockHost {
    async fn find_playlist(&self, title: &str) -> Result<Option<String>, HostError> {
        if let Some(e) = self.fail() {
            return Err(e);
        }
        self.find_calls.lock().unwrap().push(title.to_string());
        Ok(self.playlists.lock().unwrap().get(title).cloned())
    }

    async fn create_playlist(&self, title: &str) -> Result<String, HostError> {
        if let Some(e) = self.fail() {
            return Err(e);
        }
        let playlist_id = {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            format!("PL{:03}", *next_id)
        };
        self.playlists
            .lock()
            .unwrap()
            .insert(title.to_string(), playlist_id.clone());
        self.items
            .lock()
            .unwrap()
            .insert(playlist_id.clone(), Vec::new());
        self.created.lock().unwrap().push(title.to_string());
        Ok(playlist_id)
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<String>, HostError> {
        if let Some(e) = self.fail() {
            return Err(e);
        }
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_item(&self, playlist_id: &str, video_id: &str) -> Result<(), HostError> {
        if let Some(e) = self.fail() {
            return Err(e);
        }
        self.insert_attempts
            .lock()
            .unwrap()
            .push(video_id.to_string());

        {
            let mut rate_limits = self.rate_limits.lock().unwrap();
            if let Some(remaining) = rate_limits.get_mut(video_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(HostError::RateLimited { retry_after: None });
                }
            }
        }

        if self.insert_invalid.contains(video_id) {
            return Err(HostError::InvalidVideo(video_id.to_string()));
        }

        self.items
            .lock()
            .unwrap()
            .entry(playlist_id.to_string())
            .or_default()
            .push(video_id.to_string());
        Ok(())
    }

    async fn lookup_video(&self, video_id: &str) -> Result<Option<VideoInfo>, HostError> {
        if let Some(e) = self.fail() {
            return Err(e);
        }
        if self.invalid.contains(video_id) {
            return Ok(None);
        }
        let category_id = self
            .categories
            .get(video_id)
            .cloned()
            .unwrap_or_else(|| "10".to_string());
        Ok(Some(VideoInfo { category_id }))
    }
}
