use std::future::Future;

pub mod file;
pub mod memory;

pub trait TokenStore {
    fn load(&self, key: &str) -> impl Future<Output = anyhow::Result<Option<String>>> + Send;

    fn save(&self, key: &str, value: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<T: TokenStore + Send + Sync> TokenStore for &T {
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        (**self).load(key).await
    }

    async fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        (**self).save(key, value).await
    }
}
