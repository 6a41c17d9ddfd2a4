pub(crate) fn default_library_path() -> String {
    "data/poems.json".to_string()
}

pub(crate) fn default_favorites_path() -> String {
    "data/favorites.json".to_string()
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}

pub(crate) fn default_tts_program() -> String {
    "espeak-ng".to_string()
}

pub(crate) fn default_tts_voice() -> String {
    "cmn".to_string()
}

pub(crate) fn default_tts_rate() -> u32 {
    150
}

pub(crate) fn default_tts_volume() -> f32 {
    1.0
}
