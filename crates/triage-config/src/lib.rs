//! Body-part configuration and engine settings.
//!
//! [`ConfigProvider`] is the seam the inference graph loads body-part data
//! through. Three providers ship here:
//!
//! - [`FileConfigProvider`] reads a data directory laid out as
//!   `<root>/<body_part>/{config.json, buckets.json, weights.json,
//!   red_flags.json, prompts/arbitrator.txt}`
//! - [`InMemoryConfigProvider`] holds prebuilt configs, mostly for tests
//! - [`CachedConfigProvider`] wraps either and shares loaded configs
//!   process-wide
//!
//! [`EngineConfig`] carries the tunables (thresholds, timeouts, ratios) and
//! is layered from defaults, an optional file and `TRIAGE_` environment
//! variables.

#![deny(unsafe_code)]

pub mod cached;
pub mod error;
pub mod file;
pub mod memory;
pub mod provider;
pub mod settings;

pub use cached::CachedConfigProvider;
pub use error::{ConfigError, Result};
pub use file::FileConfigProvider;
pub use memory::InMemoryConfigProvider;
pub use provider::ConfigProvider;
pub use settings::{
    ArbitrationSettings, CheckpointKind, CheckpointSettings, DataSettings, EngineConfig,
    LoggingSettings, RankingSettings, SearchSettings, TierWeightSettings, TimeoutSettings,
};
