//! Configuration validation.

use std::collections::BTreeSet;

use crate::error::ConfigError;
use crate::schema::HarvesterConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// The first error as a [`ConfigError`], if any.
    pub fn into_error(self) -> Option<ConfigError> {
        self.errors
            .into_iter()
            .next()
            .map(|e| ConfigError::InvalidValue {
                field: e.path,
                message: e.message,
            })
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &HarvesterConfig) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::validate_engine(config, &mut result);
        Self::validate_logging(config, &mut result);
        Self::validate_replay(config, &mut result);
        result
    }

    fn validate_engine(config: &HarvesterConfig, result: &mut ValidationResult) {
        let engine = &config.engine;

        if engine.namespace.trim().is_empty() {
            result.add_error(ValidationError::new(
                "engine.namespace",
                "Namespace cannot be empty",
            ));
        }

        if engine.split_min_gap == 0 {
            result.add_error(ValidationError::new(
                "engine.split_min_gap",
                "split_min_gap must be greater than 0",
            ));
        }

        if engine.frame_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "engine.frame_interval_ms",
                "frame_interval_ms must be greater than 0",
            ));
        } else if engine.frame_interval_ms > 1000 {
            result.add_warning(ValidationWarning::new(
                "engine.frame_interval_ms",
                "frame_interval_ms is above one second, updates will lag noticeably",
            ));
        }

        let mut seen = BTreeSet::new();
        for section in &engine.required_sections {
            if !seen.insert(*section) {
                result.add_error(ValidationError::new(
                    "engine.required_sections",
                    format!("Section '{}' listed more than once", section),
                ));
            }
        }
        if engine.required_sections.is_empty() {
            result.add_warning(ValidationWarning::new(
                "engine.required_sections",
                "No required sections, fullyReady fires on the first ready section",
            ));
        }
    }

    fn validate_logging(config: &HarvesterConfig, result: &mut ValidationResult) {
        let level = config.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ValidationError::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    config.logging.level, LOG_LEVELS
                ),
            ));
        }

        if config.logging.file_prefix.is_empty() {
            result.add_error(ValidationError::new(
                "logging.file_prefix",
                "file_prefix cannot be empty",
            ));
        }
    }

    fn validate_replay(config: &HarvesterConfig, result: &mut ValidationResult) {
        if config.replay.max_frames == 0 {
            result.add_error(ValidationError::new(
                "replay.max_frames",
                "max_frames must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
