//! Filesystem provider.
//!
//! Layout per body part:
//!
//! ```text
//! <root>/<body_part>/config.json          code, display_name, version, bucket_order
//! <root>/<body_part>/buckets.json         bucket code -> name/description/typical_profile
//! <root>/<body_part>/weights.json         symptom code -> weight vector ("_" keys ignored)
//! <root>/<body_part>/red_flags.json       optional list of rules
//! <root>/<body_part>/prompts/arbitrator.txt  optional arbitration template
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};
use triage_types::{BodyPartConfig, BucketCode, BucketInfo, BucketOrder, RedFlagRule};

use crate::error::{ConfigError, Result};
use crate::provider::ConfigProvider;

const CONFIG_FILE: &str = "config.json";
const BUCKETS_FILE: &str = "buckets.json";
const WEIGHTS_FILE: &str = "weights.json";
const RED_FLAGS_FILE: &str = "red_flags.json";
const TEMPLATE_FILE: &str = "prompts/arbitrator.txt";

#[derive(Debug, Deserialize)]
struct BodyPartManifest {
    code: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default = "default_version")]
    version: String,
    bucket_order: Vec<BucketCode>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Reads body-part data from a directory tree.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    root: PathBuf,
}

impl FileConfigProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_safe_code(body_part: &str) -> bool {
        !body_part.is_empty()
            && body_part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    async fn read_optional(path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn read_required(path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn parse<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse_weights(
        body_part: &str,
        path: &Path,
        text: &str,
    ) -> Result<BTreeMap<String, Vec<f64>>> {
        let raw: serde_json::Map<String, serde_json::Value> = Self::parse(path, text)?;
        let mut table = BTreeMap::new();
        for (code, value) in raw {
            if code.starts_with('_') {
                continue;
            }
            let weights: Vec<f64> = serde_json::from_value(value).map_err(|e| {
                ConfigError::invalid(body_part, format!("weights for {code}: {e}"))
            })?;
            table.insert(code, weights);
        }
        Ok(table)
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn load(&self, body_part: &str) -> Result<Arc<BodyPartConfig>> {
        if !Self::is_safe_code(body_part) {
            return Err(ConfigError::NotFound(body_part.to_string()));
        }
        let dir = self.root.join(body_part);

        let manifest_path = dir.join(CONFIG_FILE);
        let manifest_text = Self::read_optional(&manifest_path)
            .await?
            .ok_or_else(|| ConfigError::NotFound(body_part.to_string()))?;
        let manifest: BodyPartManifest = Self::parse(&manifest_path, &manifest_text)?;
        if manifest.code != body_part {
            return Err(ConfigError::invalid(
                body_part,
                format!("{CONFIG_FILE} declares code {}", manifest.code),
            ));
        }

        let order = BucketOrder::new(manifest.bucket_order)
            .map_err(|e| ConfigError::from_validation(body_part, e))?;

        let buckets_path = dir.join(BUCKETS_FILE);
        let bucket_info: BTreeMap<BucketCode, BucketInfo> =
            match Self::read_optional(&buckets_path).await? {
                Some(text) => Self::parse(&buckets_path, &text)?,
                None => BTreeMap::new(),
            };

        let weights_path = dir.join(WEIGHTS_FILE);
        let weights_text = Self::read_required(&weights_path).await?;
        let weights = Self::parse_weights(body_part, &weights_path, &weights_text)?;

        let red_flags_path = dir.join(RED_FLAGS_FILE);
        let rules: Vec<RedFlagRule> = match Self::read_optional(&red_flags_path).await? {
            Some(text) => Self::parse(&red_flags_path, &text)?,
            None => Vec::new(),
        };

        let template = Self::read_optional(&dir.join(TEMPLATE_FILE)).await?;

        let mut builder = BodyPartConfig::builder(manifest.code, order)
            .version(manifest.version)
            .weights(weights);
        if let Some(name) = manifest.display_name {
            builder = builder.display_name(name);
        }
        for (bucket, info) in bucket_info {
            builder = builder.bucket_info(bucket, info);
        }
        for rule in rules {
            builder = builder.red_flag_rule(rule);
        }
        if let Some(template) = template {
            builder = builder.arbitration_template(template);
        }
        let config = builder
            .build()
            .map_err(|e| ConfigError::from_validation(body_part, e))?;

        debug!(
            buckets = config.bucket_order().len(),
            weights = config.weight_table().len(),
            red_flag_rules = config.red_flag_rules().len(),
            "loaded body part configuration"
        );
        Ok(Arc::new(config))
    }

    async fn available_body_parts(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut parts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| ConfigError::Io {
            path: self.root.clone(),
            source,
        })? {
            let path = entry.path();
            if !tokio::fs::try_exists(path.join(CONFIG_FILE))
                .await
                .unwrap_or(false)
            {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                parts.push(name.to_string());
            }
        }
        parts.sort();
        Ok(parts)
    }
}
