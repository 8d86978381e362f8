//! Configuration system for dbxauth.
//!
//! Provides TOML-based configuration with:
//! - `[oauth]` overrides for the compiled-in Dropbox app values
//! - `[callback]` redirect wait timeout
//! - `[logging]` JSON log file toggle and location
//! - Config file layering (XDG user config + project-local overrides)
//!
//! Every field is optional; unset fields fall back to the defaults baked
//! into the binary.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config_file, load_config_with_options,
    project_config_path, save_config, user_config_path, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
