//! Configuration layers and the runtime assembly configuration
//!
//! Settings merge in four layers:
//! 1. Built-in defaults
//! 2. User config (`<config_dir>/assembly/config.toml`)
//! 3. Project config (`.assembly.toml` in the project basedir)
//! 4. CLI overrides
//!
//! The merged [`Settings`] plus the loaded project model form the
//! [`AssemblyConfig`] handed to every phase.

mod defaults;
mod effective;
mod merge;
mod runtime;

pub use defaults::{BuiltinDefaults, KNOWN_FORMATS};
pub use effective::{
    project_config_path, user_config_path, ConfigError, ConfigOrigin, ConfigSource,
    EffectiveConfig, Settings,
};
pub use merge::{deep_merge, merge_layers, set_path};
pub use runtime::AssemblyConfig;
