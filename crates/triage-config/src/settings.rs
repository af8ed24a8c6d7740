//! Engine settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Top-level engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Body-part data location
    #[serde(default)]
    pub data: DataSettings,

    /// Evidence search
    #[serde(default)]
    pub search: SearchSettings,

    /// Collaborator timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Ranking fusion
    #[serde(default)]
    pub ranking: RankingSettings,

    /// Reasoning backend
    #[serde(default)]
    pub arbitration: ArbitrationSettings,

    /// Checkpointing
    #[serde(default)]
    pub checkpoint: CheckpointSettings,

    /// Logging
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Body-part data location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Root directory with one subdirectory per body part
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,

    /// Optional JSON evidence corpus for the file-backed retriever
    #[serde(default)]
    pub evidence_file: Option<PathBuf>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            evidence_file: None,
        }
    }
}

/// Evidence search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Minimum similarity for an item to count
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Maximum number of items requested
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Vote multiplier per source tier
    #[serde(default)]
    pub tier_weights: TierWeightSettings,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            top_k: default_top_k(),
            tier_weights: TierWeightSettings::default(),
        }
    }
}

/// Vote multiplier per source tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierWeightSettings {
    #[serde(default = "default_tier1")]
    pub tier1: f64,
    #[serde(default = "default_tier2")]
    pub tier2: f64,
    #[serde(default = "default_tier3")]
    pub tier3: f64,
}

impl TierWeightSettings {
    pub fn as_array(&self) -> [f64; 3] {
        [self.tier1, self.tier2, self.tier3]
    }
}

impl Default for TierWeightSettings {
    fn default() -> Self {
        Self {
            tier1: default_tier1(),
            tier2: default_tier2(),
            tier3: default_tier3(),
        }
    }
}

/// Collaborator timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Evidence search timeout in milliseconds
    #[serde(default = "default_search_timeout")]
    pub search_ms: u64,

    /// Arbitration timeout in milliseconds
    #[serde(default = "default_arbitration_timeout")]
    pub arbitration_ms: u64,
}

impl TimeoutSettings {
    pub fn search(&self) -> Duration {
        Duration::from_millis(self.search_ms)
    }

    pub fn arbitration(&self) -> Duration {
        Duration::from_millis(self.arbitration_ms)
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            search_ms: default_search_timeout(),
            arbitration_ms: default_arbitration_timeout(),
        }
    }
}

/// Ranking fusion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingSettings {
    /// Share of the weight path in the merged ranking
    #[serde(default = "default_weight_ratio")]
    pub weight_ratio: f64,

    /// Minimum position change reported as a rank shift
    #[serde(default = "default_rank_shift_threshold")]
    pub rank_shift_threshold: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            weight_ratio: default_weight_ratio(),
            rank_shift_threshold: default_rank_shift_threshold(),
        }
    }
}

/// Reasoning backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationSettings {
    /// Chat model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key; falls back to `OPENAI_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ArbitrationSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_base: default_api_base(),
            api_key: None,
        }
    }
}

/// Checkpoint store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    /// No checkpoints
    #[default]
    None,
    /// In-process log
    Memory,
    /// JSON lines under `dir`
    File,
}

/// Checkpointing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSettings {
    #[serde(default)]
    pub kind: CheckpointKind,

    /// Directory for the file store
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,

    /// Keep a request's log after it reaches DONE
    #[serde(default)]
    pub keep_completed: bool,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            kind: CheckpointKind::None,
            dir: default_checkpoint_dir(),
            keep_completed: false,
        }
    }
}

/// Logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_data_dir() -> PathBuf {
    PathBuf::from("data/medical")
}

fn default_min_score() -> f64 {
    0.35
}

fn default_top_k() -> usize {
    10
}

fn default_tier1() -> f64 {
    1.0
}

fn default_tier2() -> f64 {
    0.7
}

fn default_tier3() -> f64 {
    0.4
}

fn default_search_timeout() -> u64 {
    10_000
}

fn default_arbitration_timeout() -> u64 {
    60_000
}

fn default_weight_ratio() -> f64 {
    0.6
}

fn default_rank_shift_threshold() -> usize {
    2
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".triage/checkpoints")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Layer defaults, an optional file and `TRIAGE_` environment variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `TRIAGE_SEARCH__MIN_SCORE=0.5`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TRIAGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: EngineConfig = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> {
            Err(ConfigError::Settings(config::ConfigError::Message(reason)))
        };
        if !(0.0..=1.0).contains(&self.search.min_score) {
            return invalid(format!("search.min_score {} outside [0, 1]", self.search.min_score));
        }
        if !(0.0..=1.0).contains(&self.ranking.weight_ratio) {
            return invalid(format!(
                "ranking.weight_ratio {} outside [0, 1]",
                self.ranking.weight_ratio
            ));
        }
        if self
            .search
            .tier_weights
            .as_array()
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return invalid("search.tier_weights must be non-negative".to_string());
        }
        if self.timeouts.search_ms == 0 || self.timeouts.arbitration_ms == 0 {
            return invalid("timeouts must be positive".to_string());
        }
        Ok(())
    }
}
