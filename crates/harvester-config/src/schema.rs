//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

pub use harvester_core::EngineConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvesterConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for a daily rolling log file. No file output when unset.
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "harvester.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
            file_prefix: default_file_prefix(),
        }
    }
}

/// Replay command configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Run a frame after every replayed log record instead of only at the end.
    #[serde(default = "default_true")]
    pub frame_per_record: bool,

    /// Upper bound on frames run while draining pending work.
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_frames() -> usize {
    64
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frame_per_record: default_true(),
            max_frames: default_max_frames(),
        }
    }
}
