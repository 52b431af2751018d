use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::store::TokenStore;

/// In-memory store. Clones share the same backing map, so a test can hand a
/// clone to the system under test and inspect what was saved afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.inner.lock().unwrap().get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
