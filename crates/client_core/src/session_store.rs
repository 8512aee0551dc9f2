use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use storage::Storage;

use crate::session::SessionStore;

/// `SessionStore` persisted in the local SQLite database so a sign-in
/// survives restarts.
pub struct DurableSessionStore {
    store: Storage,
}

impl DurableSessionStore {
    pub async fn initialize(database_url: &str) -> Result<Arc<Self>> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize session storage at '{database_url}'"))?;
        Ok(Arc::new(Self { store }))
    }
}

#[async_trait]
impl SessionStore for DurableSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.load_value(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.put_value(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.store.delete_value(key).await.map(|_| ())
    }
}
