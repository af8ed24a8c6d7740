//! In-memory provider.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use triage_types::BodyPartConfig;

use crate::error::{ConfigError, Result};
use crate::provider::ConfigProvider;

/// Serves prebuilt configurations.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigProvider {
    configs: BTreeMap<String, Arc<BodyPartConfig>>,
}

impl InMemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: BodyPartConfig) -> Self {
        self.insert(config);
        self
    }

    pub fn insert(&mut self, config: BodyPartConfig) {
        self.configs
            .insert(config.code().to_string(), Arc::new(config));
    }
}

#[async_trait]
impl ConfigProvider for InMemoryConfigProvider {
    async fn load(&self, body_part: &str) -> Result<Arc<BodyPartConfig>> {
        self.configs
            .get(body_part)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(body_part.to_string()))
    }

    async fn available_body_parts(&self) -> Result<Vec<String>> {
        Ok(self.configs.keys().cloned().collect())
    }
}
