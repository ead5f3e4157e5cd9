//! Configuration for the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::readiness::Section;
use crate::value::ChangeDetection;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Key of the namespaced sub-object the log reader looks for.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Sections that must be ready before `fullyReady` fires.
    #[serde(default = "default_required_sections")]
    pub required_sections: Vec<Section>,

    /// Minimum whitespace run after a comma that separates parameter values.
    #[serde(default = "default_split_min_gap")]
    pub split_min_gap: usize,

    /// Coalescing window of the tokio frame host, in milliseconds.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// How merged values are compared against the current snapshot.
    #[serde(default)]
    pub change_detection: ChangeDetection,
}

fn default_namespace() -> String {
    "shoptet".to_string()
}

fn default_required_sections() -> Vec<Section> {
    vec![Section::Log, Section::Document]
}

fn default_split_min_gap() -> usize {
    8
}

fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            required_sections: default_required_sections(),
            split_min_gap: default_split_min_gap(),
            frame_interval_ms: default_frame_interval_ms(),
            change_detection: ChangeDetection::default(),
        }
    }
}

impl EngineConfig {
    /// Frame interval as Duration.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.namespace, "shoptet");
        assert_eq!(config.required_sections, vec![Section::Log, Section::Document]);
        assert_eq!(config.split_min_gap, 8);
        assert_eq!(config.change_detection, ChangeDetection::Identity);
    }

    #[test]
    fn test_frame_interval() {
        let config = EngineConfig {
            frame_interval_ms: 40,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(40));
    }

    #[test]
    fn test_config_deserialize_partial() {
        let parsed: EngineConfig =
            serde_json::from_str(r#"{"namespace": "shop", "change_detection": "structural"}"#)
                .unwrap();
        assert_eq!(parsed.namespace, "shop");
        assert_eq!(parsed.change_detection, ChangeDetection::Structural);
        assert_eq!(parsed.frame_interval_ms, 16);
    }
}
