//! # Harvester Config
//!
//! File configuration for the context harvester: TOML loading with `${VAR}`
//! expansion, schema defaults and validation.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
