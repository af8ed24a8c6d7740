//! Provider trait.

use async_trait::async_trait;
use std::sync::Arc;
use triage_types::BodyPartConfig;

use crate::error::Result;

/// Supplies validated per-body-part configuration.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Load the configuration of `body_part`.
    ///
    /// Returns [`ConfigError::NotFound`](crate::ConfigError::NotFound) for an
    /// unrecognised body part.
    async fn load(&self, body_part: &str) -> Result<Arc<BodyPartConfig>>;

    /// Body-part codes this provider can load, sorted.
    async fn available_body_parts(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl<P: ConfigProvider + ?Sized> ConfigProvider for Arc<P> {
    async fn load(&self, body_part: &str) -> Result<Arc<BodyPartConfig>> {
        (**self).load(body_part).await
    }

    async fn available_body_parts(&self) -> Result<Vec<String>> {
        (**self).available_body_parts().await
    }
}
