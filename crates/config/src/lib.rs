//! Configuration loading for calbridge.
//!
//! Config is read from `calbridge.toml` (working directory first, then the
//! platform config dir) and then overlaid with environment variables.

pub mod env;
pub mod loader;
pub mod schema;
pub mod template;

pub use {
    env::{apply_env_overrides, apply_process_env},
    loader::{
        CONFIG_FILE_NAME, ConfigError, config_dir, data_dir, discover_and_load,
        find_config_path, find_or_default_config_path, load_config, save_config,
        save_config_to,
    },
    schema::{
        CalbridgeConfig, FlowConfig, GatewayClientConfig, GoogleConfig, MicrosoftConfig,
        ServerConfig, StorageConfig,
    },
    template::default_config_template,
};
