//! In-memory distributions for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConfigMutator, DistributionConfig, DistributionError, DistributionUpdater, Result};

#[derive(Debug, Clone)]
struct Entry {
    config: DistributionConfig,
    etag: u64,
}

#[derive(Default)]
pub struct InMemoryDistributions {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryDistributions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_distribution(mut self, id: impl Into<String>, config: DistributionConfig) -> Self {
        self.entries.get_mut().insert(id.into(), Entry { config, etag: 1 });
        self
    }

    /// Version tag of the stored configuration; bumped on every update.
    pub async fn etag(&self, id: &str) -> Option<u64> {
        self.entries.read().await.get(id).map(|e| e.etag)
    }
}

#[async_trait]
impl DistributionUpdater for InMemoryDistributions {
    async fn fetch(&self, distribution_id: &str) -> Result<DistributionConfig> {
        self.entries
            .read()
            .await
            .get(distribution_id)
            .map(|e| e.config.clone())
            .ok_or_else(|| DistributionError::not_found(distribution_id))
    }

    async fn update(&self, distribution_id: &str, mutators: Vec<ConfigMutator>) -> Result<()> {
        if mutators.is_empty() {
            return Err(DistributionError::NoMutators);
        }

        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(distribution_id).ok_or_else(|| DistributionError::not_found(distribution_id))?;

        let mut config = entry.config.clone();
        for mutate in &mutators {
            mutate(&mut config);
        }
        entry.config = config;
        entry.etag += 1;

        tracing::debug!(distribution_id = %distribution_id, etag = entry.etag, "Updated distribution");
        Ok(())
    }
}
