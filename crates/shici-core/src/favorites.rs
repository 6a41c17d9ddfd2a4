//! Persisted set of favorite poems.
//!
//! The ledger lives in its own file and is not reconciled with the store: a
//! favorite whose poem was deleted simply stops matching anything.

use crate::error::{Error, Result};
use crate::poem::{LEGACY_KEY_SEPARATOR, PoemKey};
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk entry: a `"<title>_<author>"` string, or an object when the
/// string form would not parse back to the same key.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredFavorite {
    Key(PoemKey),
    Legacy(String),
}

impl StoredFavorite {
    fn from_key(key: &PoemKey) -> Self {
        if key.title.is_empty() || key.author.contains(LEGACY_KEY_SEPARATOR) {
            StoredFavorite::Key(key.clone())
        } else {
            StoredFavorite::Legacy(key.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct FavoritesLedger {
    path: PathBuf,
    keys: BTreeSet<PoemKey>,
}

impl FavoritesLedger {
    /// Load the ledger at `path`. A missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let keys = match fs::read_to_string(&path) {
            Ok(data) => parse_favorites(&path, &data)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No favorites file yet");
                BTreeSet::new()
            }
            Err(err) => return Err(Error::storage(&path, err)),
        };
        info!(path = %path.display(), count = keys.len(), "Loaded favorites");
        Ok(Self { path, keys })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_favorite(&self, key: &PoemKey) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PoemKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Flip membership of `key` and persist. Returns whether it is now a
    /// favorite. On a write failure the in-memory flip is rolled back.
    pub fn toggle(&mut self, key: &PoemKey) -> Result<bool> {
        let now_favorite = if self.keys.remove(key) {
            false
        } else {
            self.keys.insert(key.clone());
            true
        };
        if let Err(err) = self.save() {
            if now_favorite {
                self.keys.remove(key);
            } else {
                self.keys.insert(key.clone());
            }
            return Err(err);
        }
        debug!(key = %key, favorite = now_favorite, "Toggled favorite");
        Ok(now_favorite)
    }

    fn save(&self) -> Result<()> {
        let entries: Vec<StoredFavorite> = self.keys.iter().map(StoredFavorite::from_key).collect();
        let payload = serde_json::to_string_pretty(&entries)
            .map_err(|err| Error::storage(&self.path, err))?;
        write_atomic(&self.path, payload.as_bytes()).map_err(|err| Error::storage(&self.path, err))
    }
}

fn parse_favorites(path: &Path, data: &str) -> Result<BTreeSet<PoemKey>> {
    if data.trim().is_empty() {
        return Ok(BTreeSet::new());
    }
    let entries: Vec<StoredFavorite> =
        serde_json::from_str(data).map_err(|err| Error::storage(path, err))?;
    let mut keys = BTreeSet::new();
    for entry in entries {
        match entry {
            StoredFavorite::Key(key) => {
                keys.insert(key);
            }
            StoredFavorite::Legacy(raw) => match raw.parse::<PoemKey>() {
                Ok(key) => {
                    keys.insert(key);
                }
                Err(err) => warn!(entry = %raw, "Skipping unreadable favorite: {err}"),
            },
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = FavoritesLedger::load(dir.path().join("favorites.json")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn toggle_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut ledger = FavoritesLedger::load(dir.path().join("favorites.json")).unwrap();
        let key: PoemKey = "静夜思_李白".parse().unwrap();

        assert!(ledger.toggle(&key).unwrap());
        assert!(ledger.is_favorite(&key));

        assert!(!ledger.toggle(&key).unwrap());
        assert!(!ledger.is_favorite(&key));
    }

    #[test]
    fn toggle_persists_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        let mut ledger = FavoritesLedger::load(&path).unwrap();
        ledger.toggle(&PoemKey::new("春晓", "孟浩然")).unwrap();

        let reloaded = FavoritesLedger::load(&path).unwrap();
        assert!(reloaded.is_favorite(&PoemKey::new("春晓", "孟浩然")));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn writes_string_entries_unless_author_has_separator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        let mut ledger = FavoritesLedger::load(&path).unwrap();
        let plain = PoemKey::new("春晓", "孟浩然");
        let underscored_title = PoemKey::new("无题_其一", "李商隐");
        let underscored_author = PoemKey::new("Ode", "john_keats");
        for key in [&plain, &underscored_title, &underscored_author] {
            ledger.toggle(key).unwrap();
        }

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entries = raw.as_array().unwrap();
        assert!(entries.contains(&serde_json::json!("春晓_孟浩然")));
        assert!(entries.contains(&serde_json::json!("无题_其一_李商隐")));
        assert!(entries.contains(&serde_json::json!({"title": "Ode", "author": "john_keats"})));

        let reloaded = FavoritesLedger::load(&path).unwrap();
        for key in [&plain, &underscored_title, &underscored_author] {
            assert!(reloaded.is_favorite(key));
        }
    }

    #[test]
    fn reads_legacy_string_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        fs::write(
            &path,
            r#"["静夜思_李白", {"title": "春晓", "author": "孟浩然"}, "_nobody"]"#,
        )
        .unwrap();

        let ledger = FavoritesLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_favorite(&PoemKey::new("静夜思", "李白")));
        assert!(ledger.is_favorite(&PoemKey::new("春晓", "孟浩然")));
    }

    #[test]
    fn malformed_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FavoritesLedger::load(&path),
            Err(Error::Storage { .. })
        ));
    }
}
