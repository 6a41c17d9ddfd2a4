//! Per-library UI state remembered between runs.
//!
//! Entries live under `<cache_dir>/<sha256 of the library path>/` so each
//! library file gets its own directory. The only entry today is
//! `session.toml` with the last sort, view and narration settings.

use crate::query::SortState;
use crate::session::ViewMode;
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SESSION_FILE: &str = "session.toml";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub rate: u32,
    pub volume: f32,
    #[serde(default)]
    pub view: ViewMode,
    #[serde(default)]
    pub sort: SortState,
}

pub fn hash_dir(cache_root: &Path, library_path: &Path) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(library_path.as_os_str().to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    cache_root.join(hash)
}

fn session_path(cache_root: &Path, library_path: &Path) -> PathBuf {
    hash_dir(cache_root, library_path).join(SESSION_FILE)
}

/// Load the remembered state for a library, if present and readable.
pub fn load_session_state(cache_root: &Path, library_path: &Path) -> Option<SessionState> {
    let path = session_path(cache_root, library_path);
    let data = fs::read_to_string(&path).ok()?;
    match toml::from_str(&data) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!(path = %path.display(), "Ignoring unreadable session cache: {err}");
            None
        }
    }
}

/// Persist the state for a library. Failures are logged and otherwise
/// ignored; the cache is best effort.
pub fn save_session_state(cache_root: &Path, library_path: &Path, state: &SessionState) {
    let path = session_path(cache_root, library_path);
    let contents = match toml::to_string(state) {
        Ok(contents) => contents,
        Err(err) => {
            warn!("Failed to serialize session cache: {err}");
            return;
        }
    };
    match write_atomic(&path, contents.as_bytes()) {
        Ok(()) => debug!(path = %path.display(), "Saved session cache"),
        Err(err) => warn!(path = %path.display(), "Failed to save session cache: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortColumn;
    use tempfile::TempDir;

    #[test]
    fn hash_dir_is_stable_per_library() {
        let root = Path::new(".cache");
        let a = hash_dir(root, Path::new("data/poems.json"));
        assert_eq!(a, hash_dir(root, Path::new("data/poems.json")));
        assert_ne!(a, hash_dir(root, Path::new("data/other.json")));
        assert!(a.starts_with(root));
        assert_eq!(a.file_name().unwrap().len(), 64);
    }

    #[test]
    fn session_state_round_trips() {
        let dir = TempDir::new().unwrap();
        let library = Path::new("poems.json");
        let mut sort = SortState::default();
        sort.cycle(SortColumn::Author);
        let state = SessionState {
            sort,
            view: ViewMode::Favorites,
            rate: 120,
            volume: 0.75,
        };

        save_session_state(dir.path(), library, &state);
        assert_eq!(load_session_state(dir.path(), library), Some(state));
        assert_eq!(load_session_state(dir.path(), Path::new("other.json")), None);
    }

    #[test]
    fn corrupt_entry_is_ignored() {
        let dir = TempDir::new().unwrap();
        let library = Path::new("poems.json");
        let path = session_path(dir.path(), library);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "rate = \"fast\"").unwrap();
        assert_eq!(load_session_state(dir.path(), library), None);
    }
}
