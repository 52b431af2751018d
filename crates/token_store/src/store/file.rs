use std::{io::ErrorKind, path::PathBuf};

use anyhow::Context;

use crate::store::TokenStore;

/// File-backed store: each key becomes one file under the configured
/// directory. The directory is created on first save.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileTokenStore { dir: dir.into() }
    }
}

impl TokenStore for FileTokenStore {
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.dir.join(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents.trim_end().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(format!("Failed to read token file {}", path.display())),
        }
    }

    async fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create token dir {}", self.dir.display()))?;

        let path = self.dir.join(key);
        tokio::fs::write(&path, value)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, path = ?path, "Failed to write token file"))
            .with_context(|| format!("Failed to write token file {}", path.display()))?;

        Ok(())
    }
}
