//! Configuration for the EducaMais client.
//!
//! Provides TOML-based configuration with:
//! - Server connection settings (`[api]`)
//! - Query cache tuning (`[cache]`)
//! - Session storage backend and data directory (`[storage]`)
//! - Config file layering (user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    config_dir, data_dir, load_config, load_config_file, load_config_with_options, save_config,
    user_config_path, ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use types::*;
