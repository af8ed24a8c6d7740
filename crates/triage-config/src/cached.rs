//! Process-wide config cache.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;
use triage_types::BodyPartConfig;

use crate::error::Result;
use crate::provider::ConfigProvider;

/// Caches every successfully loaded config; failures are not cached.
pub struct CachedConfigProvider {
    inner: Arc<dyn ConfigProvider>,
    cache: DashMap<String, Arc<BodyPartConfig>>,
}

impl CachedConfigProvider {
    pub fn new(inner: Arc<dyn ConfigProvider>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Drop one cached entry, or all of them.
    pub fn invalidate(&self, body_part: Option<&str>) {
        match body_part {
            Some(code) => {
                self.cache.remove(code);
            }
            None => self.cache.clear(),
        }
    }
}

#[async_trait]
impl ConfigProvider for CachedConfigProvider {
    async fn load(&self, body_part: &str) -> Result<Arc<BodyPartConfig>> {
        if let Some(hit) = self.cache.get(body_part) {
            trace!(body_part, "config cache hit");
            return Ok(Arc::clone(hit.value()));
        }
        let loaded = self.inner.load(body_part).await?;
        // A concurrent loader may have won; keep whichever landed first.
        let entry = self
            .cache
            .entry(body_part.to_string())
            .or_insert(loaded);
        Ok(Arc::clone(entry.value()))
    }

    async fn available_body_parts(&self) -> Result<Vec<String>> {
        self.inner.available_body_parts().await
    }
}

impl std::fmt::Debug for CachedConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedConfigProvider")
            .field("cached", &self.cache.len())
            .finish()
    }
}
