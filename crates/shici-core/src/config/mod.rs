//! Configuration loading for the poem viewer.
//!
//! Settings live in `conf/config.toml` as `[library]`, `[logging]` and `[tts]`
//! tables. Missing or invalid entries fall back to defaults so the viewer can
//! always start.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{AppConfig, LogLevel};

pub const CONFIG_PATH_ENV: &str = "SHICI_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

/// Config path from `SHICI_CONFIG_PATH`, or `conf/config.toml`.
pub fn config_path() -> std::path::PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from(DEFAULT_CONFIG_PATH))
}
