use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

/// High-level app configuration, flattened from the TOML tables.
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_library_path")]
    pub library_path: String,
    #[serde(default = "crate::config::defaults::default_favorites_path")]
    pub favorites_path: String,
    #[serde(default = "crate::config::defaults::default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_tts_program")]
    pub tts_program: String,
    /// Empty means the synthesizer's default voice.
    #[serde(default = "crate::config::defaults::default_tts_voice")]
    pub tts_voice: String,
    #[serde(default = "crate::config::defaults::default_tts_rate")]
    pub tts_rate: u32,
    #[serde(default = "crate::config::defaults::default_tts_volume")]
    pub tts_volume: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        use crate::config::defaults;
        AppConfig {
            library_path: defaults::default_library_path(),
            favorites_path: defaults::default_favorites_path(),
            cache_dir: defaults::default_cache_dir(),
            log_level: defaults::default_log_level(),
            tts_program: defaults::default_tts_program(),
            tts_voice: defaults::default_tts_voice(),
            tts_rate: defaults::default_tts_rate(),
            tts_volume: defaults::default_tts_volume(),
        }
    }
}

impl AppConfig {
    pub fn library_path(&self) -> PathBuf {
        PathBuf::from(&self.library_path)
    }

    pub fn favorites_path(&self) -> PathBuf {
        PathBuf::from(&self.favorites_path)
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }

    pub fn tts_voice(&self) -> Option<String> {
        let voice = self.tts_voice.trim();
        (!voice.is_empty()).then(|| voice.to_string())
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Default, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
