//! Driver-wide configuration: schema, loading, env substitution and validation.
//!
//! Config files: `berth.toml`, `berth.yaml`, or `berth.json`
//! Searched in `./` then `~/.config/berth/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{ConfigError, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{DriverConfig, RegistryAuth},
    validate::{Diagnostic, Severity, validate},
};
