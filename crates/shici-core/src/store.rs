//! The canonical poem collection and its JSON document.
//!
//! The store keeps every record in memory and rewrites the whole document
//! after each mutation. A failed write leaves memory ahead of disk; the error
//! is returned so the caller can surface it.

use crate::error::{Error, Result};
use crate::phonetic::ensure_pinyin;
use crate::poem::{PoemKey, PoemPatch, PoemRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct PoemDocument {
    poems: Vec<PoemRecord>,
}

#[derive(Serialize)]
struct PoemDocumentRef<'a> {
    poems: &'a [PoemRecord],
}

/// Read the `{ "poems": [...] }` document at `path`.
pub fn load_poems(path: &Path) -> Result<Vec<PoemRecord>> {
    let data = fs::read_to_string(path).map_err(|err| Error::storage(path, err))?;
    parse_poems(&data).map_err(|err| Error::storage(path, err))
}

pub(crate) fn parse_poems(data: &str) -> std::result::Result<Vec<PoemRecord>, serde_json::Error> {
    let document: PoemDocument = serde_json::from_str(data)?;
    Ok(document.poems)
}

pub(crate) fn render_poems(records: &[PoemRecord]) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&PoemDocumentRef { poems: records })
}

/// Write the full collection to `path`, replacing it atomically.
pub fn save_poems(path: &Path, records: &[PoemRecord]) -> Result<()> {
    let payload = render_poems(records).map_err(|err| Error::storage(path, err))?;
    write_atomic(path, payload.as_bytes()).map_err(|err| Error::storage(path, err))?;
    debug!(path = %path.display(), count = records.len(), "Saved poem document");
    Ok(())
}

/// Write to a sibling temp file, then rename over the target.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = unique_temp_path(path);
    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    if let Err(err) = fs::rename(&temp_path, path) {
        warn!(path = %path.display(), "Rename failed, copying instead: {err}");
        let copied = fs::copy(&temp_path, path);
        let _ = fs::remove_file(&temp_path);
        copied?;
    }
    Ok(())
}

fn unique_temp_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nonce = SEQ.fetch_add(1, Ordering::Relaxed);
    let ts_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut temp_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("poems.json")
        .to_string();
    temp_name.push_str(&format!(".tmp-{ts_nanos}-{nonce}"));
    path.with_file_name(temp_name)
}

/// What to do with an incoming record whose key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Overwrite,
    Skip,
    AbortAll,
}

/// Decides each merge conflict. A bare `ConflictPolicy` applies globally;
/// closures let the UI ask per record.
pub trait ConflictResolver {
    fn resolve(&mut self, existing: &PoemRecord, incoming: &PoemRecord) -> ConflictPolicy;
}

impl ConflictResolver for ConflictPolicy {
    fn resolve(&mut self, _existing: &PoemRecord, _incoming: &PoemRecord) -> ConflictPolicy {
        *self
    }
}

impl<F> ConflictResolver for F
where
    F: FnMut(&PoemRecord, &PoemRecord) -> ConflictPolicy,
{
    fn resolve(&mut self, existing: &PoemRecord, incoming: &PoemRecord) -> ConflictPolicy {
        self(existing, incoming)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub overwritten: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct PoemStore {
    path: PathBuf,
    poems: Vec<PoemRecord>,
}

impl PoemStore {
    /// Open the document at `path`. Load failures leave nothing half-built.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let poems = load_poems(&path)?;
        info!(path = %path.display(), count = poems.len(), "Opened poem library");
        Ok(Self { path, poems })
    }

    /// Create a new library file holding `poems`.
    pub fn create(path: impl Into<PathBuf>, poems: Vec<PoemRecord>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            poems,
        };
        store.save()?;
        info!(path = %store.path.display(), count = store.poems.len(), "Created poem library");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[PoemRecord] {
        &self.poems
    }

    pub fn len(&self) -> usize {
        self.poems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poems.is_empty()
    }

    pub fn get(&self, key: &PoemKey) -> Option<&PoemRecord> {
        self.poems.iter().find(|poem| poem.matches_key(key))
    }

    pub fn contains(&self, key: &PoemKey) -> bool {
        self.get(key).is_some()
    }

    pub fn save(&self) -> Result<()> {
        save_poems(&self.path, &self.poems)
    }

    pub fn add(&mut self, record: PoemRecord) -> Result<()> {
        record.validate()?;
        let key = record.key();
        if self.contains(&key) {
            return Err(Error::DuplicateKey(key));
        }
        self.poems.push(record);
        info!(title = %key.title, author = %key.author, "Added poem");
        self.save()
    }

    pub fn update(&mut self, key: &PoemKey, patch: PoemPatch) -> Result<()> {
        let idx = self
            .poems
            .iter()
            .position(|poem| poem.matches_key(key))
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        let new_key = patch.resulting_key(key);
        if &new_key != key && self.contains(&new_key) {
            return Err(Error::DuplicateKey(new_key));
        }
        let mut updated = self.poems[idx].clone();
        patch.apply_to(&mut updated);
        updated.validate()?;
        self.poems[idx] = updated;
        info!(title = %new_key.title, author = %new_key.author, "Updated poem");
        self.save()
    }

    /// Remove every record whose key is in `keys`. Unknown keys are ignored.
    pub fn delete(&mut self, keys: &HashSet<PoemKey>) -> Result<usize> {
        let before = self.poems.len();
        self.poems.retain(|poem| !keys.contains(&poem.key()));
        let removed = before - self.poems.len();
        info!(requested = keys.len(), removed, "Deleted poems");
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    /// Merge `incoming` into the store, asking `resolver` about collisions.
    ///
    /// Records without a title are dropped. Pinyin is ensured on every
    /// accepted record. `AbortAll` discards the whole merge.
    pub fn merge<R: ConflictResolver>(
        &mut self,
        incoming: Vec<PoemRecord>,
        mut resolver: R,
    ) -> Result<MergeReport> {
        let mut staged = self.poems.clone();
        let mut report = MergeReport::default();

        for record in incoming {
            if record.validate().is_err() {
                debug!("Dropping imported record without a title");
                continue;
            }
            let record = ensure_pinyin(record);
            let key = record.key();
            match staged.iter().position(|poem| poem.matches_key(&key)) {
                None => {
                    staged.push(record);
                    report.added += 1;
                }
                Some(idx) => match resolver.resolve(&staged[idx], &record) {
                    ConflictPolicy::Overwrite => {
                        staged[idx] = record;
                        report.overwritten += 1;
                    }
                    ConflictPolicy::Skip => report.skipped += 1,
                    ConflictPolicy::AbortAll => {
                        info!(title = %key.title, author = %key.author, "Merge aborted by resolver");
                        return Err(Error::MergeAborted(key));
                    }
                },
            }
        }

        info!(
            added = report.added,
            overwritten = report.overwritten,
            skipped = report.skipped,
            "Merged poems"
        );
        if report.added + report.overwritten > 0 {
            self.poems = staged;
            self.save()?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn poem(title: &str, author: &str) -> PoemRecord {
        PoemRecord::new(title, author, "唐", vec![format!("{title}之句")])
    }

    fn store_with(dir: &TempDir, poems: Vec<PoemRecord>) -> PoemStore {
        PoemStore::create(dir.path().join("poems.json"), poems).unwrap()
    }

    #[test]
    fn load_fails_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = PoemStore::open(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[test]
    fn load_fails_without_poems_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poems.json");
        fs::write(&path, r#"{"items": []}"#).unwrap();
        assert!(matches!(load_poems(&path), Err(Error::Storage { .. })));
        fs::write(&path, "not json").unwrap();
        assert!(matches!(load_poems(&path), Err(Error::Storage { .. })));
    }

    #[test]
    fn save_then_open_preserves_records_and_field_order() {
        let dir = TempDir::new().unwrap();
        let mut record = poem("静夜思", "李白");
        record.translation = "译文".into();
        let store = store_with(&dir, vec![record.clone()]);

        let reopened = PoemStore::open(store.path()).unwrap();
        assert_eq!(reopened.records(), &[record]);

        let raw = fs::read_to_string(store.path()).unwrap();
        let title_at = raw.find("\"title\"").unwrap();
        let author_at = raw.find("\"author\"").unwrap();
        let intro_at = raw.find("\"author_intro\"").unwrap();
        assert!(title_at < author_at && author_at < intro_at);
        assert!(raw.contains("静夜思"), "non-ASCII text should not be escaped");
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![]);
        store.add(poem("春晓", "孟浩然")).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["poems.json".to_string()]);
    }

    #[test]
    fn failed_write_cleans_up_temp_file() {
        let dir = TempDir::new().unwrap();
        // A directory at the target makes the rename and the copy fallback fail.
        let target = dir.path().join("poems.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        assert!(write_atomic(&target, b"{}").is_err());
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["poems.json".to_string()]);
    }

    #[test]
    fn add_rejects_duplicate_key() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![poem("春晓", "孟浩然")]);
        let err = store.add(poem("春晓", "孟浩然")).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
        assert_eq!(store.len(), 1);

        store.add(poem("春晓", "无名氏")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn add_rejects_empty_title() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![]);
        assert!(matches!(
            store.add(poem(" ", "李白")),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn update_missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![poem("春晓", "孟浩然")]);
        let err = store
            .update(&PoemKey::new("静夜思", "李白"), PoemPatch::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn update_persists_and_rejects_rename_collision() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![poem("春晓", "孟浩然"), poem("静夜思", "李白")]);
        let key = PoemKey::new("春晓", "孟浩然");

        store
            .update(
                &key,
                PoemPatch {
                    note: Some("注释".into()),
                    ..PoemPatch::default()
                },
            )
            .unwrap();
        let reopened = PoemStore::open(store.path()).unwrap();
        assert_eq!(reopened.get(&key).unwrap().note, "注释");

        let err = store
            .update(
                &key,
                PoemPatch {
                    title: Some("静夜思".into()),
                    author: Some("李白".into()),
                    ..PoemPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
        assert!(store.contains(&key));
    }

    #[test]
    fn delete_ignores_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![poem("春晓", "孟浩然"), poem("静夜思", "李白")]);
        let keys: HashSet<PoemKey> = [
            PoemKey::new("春晓", "孟浩然"),
            PoemKey::new("登鹳雀楼", "王之涣"),
        ]
        .into_iter()
        .collect();
        assert_eq!(store.delete(&keys).unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&PoemKey::new("静夜思", "李白")));
    }

    #[test]
    fn merge_skip_never_changes_existing_record() {
        let dir = TempDir::new().unwrap();
        let original = poem("春晓", "孟浩然");
        let mut store = store_with(&dir, vec![original.clone()]);
        let mut incoming = poem("春晓", "孟浩然");
        incoming.note = "新注释".into();

        let report = store
            .merge(vec![incoming, poem("静夜思", "李白")], ConflictPolicy::Skip)
            .unwrap();

        assert_eq!(
            report,
            MergeReport {
                added: 1,
                overwritten: 0,
                skipped: 1
            }
        );
        assert_eq!(store.get(&original.key()).unwrap(), &original);
    }

    #[test]
    fn merge_overwrite_replaces_fields() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![poem("春晓", "孟浩然")]);
        let mut incoming = ensure_pinyin(poem("春晓", "孟浩然"));
        incoming.note = "新注释".into();
        incoming.dynasty = "盛唐".into();

        let report = store
            .merge(vec![incoming.clone()], ConflictPolicy::Overwrite)
            .unwrap();

        assert_eq!(report.overwritten, 1);
        assert_eq!(store.get(&incoming.key()).unwrap(), &incoming);
    }

    #[test]
    fn merge_abort_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![poem("春晓", "孟浩然")]);
        let before = store.records().to_vec();

        let err = store
            .merge(
                vec![poem("静夜思", "李白"), poem("春晓", "孟浩然")],
                ConflictPolicy::AbortAll,
            )
            .unwrap_err();

        assert!(matches!(err, Error::MergeAborted(_)));
        assert_eq!(store.records(), before.as_slice());
        assert_eq!(PoemStore::open(store.path()).unwrap().records(), before.as_slice());
    }

    #[test]
    fn merge_asks_resolver_per_conflict_and_drops_untitled() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![poem("春晓", "孟浩然"), poem("静夜思", "李白")]);
        let mut asked = Vec::new();

        let report = store
            .merge(
                vec![poem("春晓", "孟浩然"), poem("静夜思", "李白"), poem("", "佚名")],
                |existing: &PoemRecord, _incoming: &PoemRecord| {
                    asked.push(existing.title.clone());
                    if existing.title == "春晓" {
                        ConflictPolicy::Overwrite
                    } else {
                        ConflictPolicy::Skip
                    }
                },
            )
            .unwrap();

        assert_eq!(asked, vec!["春晓".to_string(), "静夜思".to_string()]);
        assert_eq!(report.overwritten, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.added, 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn merge_ensures_pinyin_on_new_records() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![]);
        store
            .merge(vec![poem("静夜思", "李白")], ConflictPolicy::Skip)
            .unwrap();
        let stored = store.get(&PoemKey::new("静夜思", "李白")).unwrap();
        assert_eq!(stored.title_pinyin, "jìng yè sī");
        assert_eq!(stored.content_pinyin.len(), stored.content.len());
    }
}
