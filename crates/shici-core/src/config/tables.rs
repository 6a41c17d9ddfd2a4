use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    library: LibraryConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    tts: TtsConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            library_path: tables.library.library_path,
            favorites_path: tables.library.favorites_path,
            cache_dir: tables.library.cache_dir,
            log_level: tables.logging.log_level,
            tts_program: tables.tts.program,
            tts_voice: tables.tts.voice,
            tts_rate: tables.tts.rate,
            tts_volume: tables.tts.volume,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            library: LibraryConfig {
                library_path: config.library_path.clone(),
                favorites_path: config.favorites_path.clone(),
                cache_dir: config.cache_dir.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            tts: TtsConfig {
                program: config.tts_program.clone(),
                voice: config.tts_voice.clone(),
                rate: config.tts_rate,
                volume: config.tts_volume,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LibraryConfig {
    #[serde(default = "defaults::default_library_path")]
    library_path: String,
    #[serde(default = "defaults::default_favorites_path")]
    favorites_path: String,
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            library_path: defaults::default_library_path(),
            favorites_path: defaults::default_favorites_path(),
            cache_dir: defaults::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct TtsConfig {
    #[serde(default = "defaults::default_tts_program")]
    program: String,
    #[serde(default = "defaults::default_tts_voice")]
    voice: String,
    #[serde(default = "defaults::default_tts_rate")]
    rate: u32,
    #[serde(default = "defaults::default_tts_volume")]
    volume: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        TtsConfig {
            program: defaults::default_tts_program(),
            voice: defaults::default_tts_voice(),
            rate: defaults::default_tts_rate(),
            volume: defaults::default_tts_volume(),
        }
    }
}
