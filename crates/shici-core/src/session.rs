//! The library session: the narrow surface a UI drives.
//!
//! Commands go in through `apply_command`; every command answers with the
//! resulting snapshot. Store, favorites and query state are touched only on
//! the caller's context. Narration runs on the playback worker and reports
//! back through `PlaybackController::poll_events`, which every command
//! drains first.

use crate::cache::{self, SessionState};
use crate::config::AppConfig;
use crate::editor;
use crate::error::{Error, Result};
use crate::favorites::FavoritesLedger;
use crate::interchange;
use crate::playback::{PlaybackController, PlaybackEvent, PlaybackState};
use crate::poem::{PoemKey, PoemPatch, PoemRecord};
use crate::query::{self, SearchCriteria, SortColumn, SortDirection, SortState};
use crate::speech::{CommandEngineProvider, EngineProvider, Voice};
use crate::store::{ConflictPolicy, ConflictResolver, MergeReport, PoemStore};
use crate::text_utils::poem_segments;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ViewMode {
    #[default]
    All,
    Favorites,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct PoemRow {
    pub title: String,
    pub author: String,
    pub dynasty: String,
    pub favorite: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct PlaybackView {
    pub state: PlaybackState,
    pub current_segment: Option<usize>,
    pub segment_count: usize,
    pub rate: u32,
    pub volume: f32,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct LibrarySnapshot {
    pub rows: Vec<PoemRow>,
    pub total_poems: usize,
    pub favorite_count: usize,
    pub criteria: SearchCriteria,
    pub sort_column: Option<SortColumn>,
    pub sort_direction: SortDirection,
    pub view: ViewMode,
    pub selected: Option<PoemKey>,
    pub playback: PlaybackView,
}

#[derive(Debug, Clone)]
pub enum LibraryCommand {
    GetSnapshot,
    Search { criteria: SearchCriteria },
    ClearSearch,
    SortBy { column: SortColumn },
    ShowAll,
    ShowFavorites,
    Select { key: PoemKey },
    ClearSelection,
    ToggleFavorite { key: PoemKey },
    Add { record: PoemRecord },
    Update { key: PoemKey, patch: PoemPatch },
    SaveEdited { key: PoemKey, text: String },
    Delete { keys: Vec<PoemKey> },
    Import { path: PathBuf, policy: ConflictPolicy },
    Export { path: PathBuf },
    ReadAloud { key: PoemKey },
    Pause,
    Resume,
    TogglePause,
    Stop,
    SetRate { rate: u32 },
    SetVolume { volume: f32 },
    ListVoices,
    PollPlayback,
}

impl LibraryCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "library_get_snapshot",
            Self::Search { .. } => "library_search",
            Self::ClearSearch => "library_clear_search",
            Self::SortBy { .. } => "library_sort_by",
            Self::ShowAll => "library_show_all",
            Self::ShowFavorites => "library_show_favorites",
            Self::Select { .. } => "library_select",
            Self::ClearSelection => "library_clear_selection",
            Self::ToggleFavorite { .. } => "library_toggle_favorite",
            Self::Add { .. } => "library_add",
            Self::Update { .. } => "library_update",
            Self::SaveEdited { .. } => "library_save_edited",
            Self::Delete { .. } => "library_delete",
            Self::Import { .. } => "library_import",
            Self::Export { .. } => "library_export",
            Self::ReadAloud { .. } => "narration_read_aloud",
            Self::Pause => "narration_pause",
            Self::Resume => "narration_resume",
            Self::TogglePause => "narration_toggle_pause",
            Self::Stop => "narration_stop",
            Self::SetRate { .. } => "narration_set_rate",
            Self::SetVolume { .. } => "narration_set_volume",
            Self::ListVoices => "narration_list_voices",
            Self::PollPlayback => "narration_poll",
        }
    }
}

/// Command-specific result carried alongside the snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CommandOutcome {
    #[default]
    None,
    Favorite(bool),
    Deleted(usize),
    Merged(MergeReport),
    Exported(usize),
    Voices(Vec<Voice>),
}

#[derive(Debug, Clone)]
pub struct LibraryEvent {
    pub action: &'static str,
    pub snapshot: LibrarySnapshot,
    pub outcome: CommandOutcome,
    /// Narration events applied while handling this command.
    pub playback_events: Vec<PlaybackEvent>,
}

pub struct LibrarySession {
    store: PoemStore,
    favorites: FavoritesLedger,
    criteria: SearchCriteria,
    sort: SortState,
    view: ViewMode,
    selected: Option<PoemKey>,
    playback: PlaybackController,
    cache_root: Option<PathBuf>,
}

impl LibrarySession {
    pub fn new(store: PoemStore, favorites: FavoritesLedger, playback: PlaybackController) -> Self {
        Self {
            store,
            favorites,
            criteria: SearchCriteria::default(),
            sort: SortState::default(),
            view: ViewMode::All,
            selected: None,
            playback,
            cache_root: None,
        }
    }

    /// Open the library at `library_path` with settings from `config`. A
    /// missing library file starts an empty collection; remembered sort,
    /// view and narration settings are restored from the cache.
    pub fn open(config: &AppConfig, library_path: &Path) -> Result<Self> {
        let provider = CommandEngineProvider::new(config.tts_program.clone(), config.tts_voice());
        Self::open_with(config, library_path, provider)
    }

    pub fn open_with(
        config: &AppConfig,
        library_path: &Path,
        provider: impl EngineProvider + 'static,
    ) -> Result<Self> {
        let store = if library_path.exists() {
            PoemStore::open(library_path)?
        } else {
            info!(path = %library_path.display(), "Starting a new poem library");
            PoemStore::create(library_path, Vec::new())?
        };
        let favorites = FavoritesLedger::load(config.favorites_path())?;

        let mut playback = PlaybackController::new(provider);
        playback.set_rate(config.tts_rate);
        playback.set_volume(config.tts_volume);

        let mut session = Self::new(store, favorites, playback);
        session.cache_root = Some(config.cache_dir());
        if let Some(state) = cache::load_session_state(&config.cache_dir(), library_path) {
            debug!(?state, "Restoring session state");
            session.restore_state(state);
        }
        Ok(session)
    }

    pub fn store(&self) -> &PoemStore {
        &self.store
    }

    pub fn favorites(&self) -> &FavoritesLedger {
        &self.favorites
    }

    pub fn selected_record(&self) -> Option<&PoemRecord> {
        self.selected.as_ref().and_then(|key| self.store.get(key))
    }

    /// Editor text for the selected poem.
    pub fn selected_editor_text(&self) -> Option<String> {
        self.selected_record().map(editor::render)
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            rate: self.playback.rate(),
            volume: self.playback.volume(),
            view: self.view,
            sort: self.sort,
        }
    }

    pub fn restore_state(&mut self, state: SessionState) {
        self.sort = state.sort;
        self.view = state.view;
        self.playback.set_rate(state.rate);
        self.playback.set_volume(state.volume);
    }

    pub fn apply_command(&mut self, command: LibraryCommand) -> Result<LibraryEvent> {
        let action = command.action();
        let playback_events = self.playback.poll_events();
        let outcome = match command {
            LibraryCommand::GetSnapshot | LibraryCommand::PollPlayback => CommandOutcome::None,
            LibraryCommand::Search { criteria } => {
                self.criteria = criteria;
                CommandOutcome::None
            }
            LibraryCommand::ClearSearch => {
                self.criteria = SearchCriteria::default();
                CommandOutcome::None
            }
            LibraryCommand::SortBy { column } => {
                let direction = self.sort.cycle(column);
                debug!(?column, ?direction, "Sort cycled");
                self.remember_state();
                CommandOutcome::None
            }
            LibraryCommand::ShowAll => {
                self.set_view(ViewMode::All);
                CommandOutcome::None
            }
            LibraryCommand::ShowFavorites => {
                self.set_view(ViewMode::Favorites);
                CommandOutcome::None
            }
            LibraryCommand::Select { key } => {
                self.select(key)?;
                CommandOutcome::None
            }
            LibraryCommand::ClearSelection => {
                self.selected = None;
                CommandOutcome::None
            }
            LibraryCommand::ToggleFavorite { key } => {
                CommandOutcome::Favorite(self.favorites.toggle(&key)?)
            }
            LibraryCommand::Add { record } => {
                let record = crate::phonetic::ensure_pinyin(record);
                let key = record.key();
                self.store.add(record)?;
                self.selected = Some(key);
                CommandOutcome::None
            }
            LibraryCommand::Update { key, patch } => {
                self.update(&key, patch)?;
                CommandOutcome::None
            }
            LibraryCommand::SaveEdited { key, text } => {
                self.update(&key, editor::parse(&text).into_patch())?;
                CommandOutcome::None
            }
            LibraryCommand::Delete { keys } => CommandOutcome::Deleted(self.delete(keys)?),
            LibraryCommand::Import { path, policy } => {
                CommandOutcome::Merged(self.import_with(&path, policy)?)
            }
            LibraryCommand::Export { path } => {
                interchange::export(&path, self.store.records())?;
                CommandOutcome::Exported(self.store.len())
            }
            LibraryCommand::ReadAloud { key } => {
                self.read_aloud(key)?;
                CommandOutcome::None
            }
            LibraryCommand::Pause => {
                self.playback.pause();
                CommandOutcome::None
            }
            LibraryCommand::Resume => {
                self.playback.resume();
                CommandOutcome::None
            }
            LibraryCommand::TogglePause => {
                self.playback.toggle_pause();
                CommandOutcome::None
            }
            LibraryCommand::Stop => {
                self.playback.stop();
                CommandOutcome::None
            }
            LibraryCommand::SetRate { rate } => {
                self.playback.set_rate(rate);
                self.remember_state();
                CommandOutcome::None
            }
            LibraryCommand::SetVolume { volume } => {
                self.playback.set_volume(volume);
                self.remember_state();
                CommandOutcome::None
            }
            LibraryCommand::ListVoices => CommandOutcome::Voices(self.playback.voices()?),
        };
        Ok(LibraryEvent {
            action,
            snapshot: self.snapshot(),
            outcome,
            playback_events,
        })
    }

    /// Import `path` and merge it, asking `resolver` about each conflict.
    pub fn import_with<R: ConflictResolver>(
        &mut self,
        path: &Path,
        resolver: R,
    ) -> Result<MergeReport> {
        let incoming = interchange::import(path)?;
        self.merge_records(incoming, resolver)
    }

    /// Merge records that were already read, e.g. by a caller that wants to
    /// ask about conflicts before taking the session.
    pub fn merge_records<R: ConflictResolver>(
        &mut self,
        incoming: Vec<PoemRecord>,
        resolver: R,
    ) -> Result<MergeReport> {
        self.store.merge(incoming, resolver)
    }

    /// Rows currently visible: search filter first, then the favorites view
    /// or the column sort.
    pub fn visible_records(&self) -> Vec<&PoemRecord> {
        let matched = query::filter(self.store.records(), &self.criteria);
        match self.view {
            ViewMode::All => self.sort.apply(matched),
            ViewMode::Favorites => query::favorites_only(matched, &self.favorites),
        }
    }

    pub fn snapshot(&self) -> LibrarySnapshot {
        let rows = self
            .visible_records()
            .into_iter()
            .map(|record| PoemRow {
                title: record.title.clone(),
                author: record.author.clone(),
                dynasty: record.dynasty.clone(),
                favorite: self.favorites.is_favorite(&record.key()),
            })
            .collect();
        LibrarySnapshot {
            rows,
            total_poems: self.store.len(),
            favorite_count: self.favorites.len(),
            criteria: self.criteria.clone(),
            sort_column: self.sort.column(),
            sort_direction: self.sort.direction(),
            view: self.view,
            selected: self.selected.clone(),
            playback: PlaybackView {
                state: self.playback.state(),
                current_segment: self.playback.cursor(),
                segment_count: self.playback.segment_count(),
                rate: self.playback.rate(),
                volume: self.playback.volume(),
            },
        }
    }

    fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.view = view;
            self.remember_state();
        }
    }

    fn select(&mut self, key: PoemKey) -> Result<()> {
        if !self.store.contains(&key) {
            return Err(Error::NotFound(key));
        }
        self.selected = Some(key);
        Ok(())
    }

    fn update(&mut self, key: &PoemKey, patch: PoemPatch) -> Result<()> {
        let renamed = patch.resulting_key(key);
        self.store.update(key, patch)?;
        if self.selected.as_ref() == Some(key) {
            self.selected = Some(renamed);
        }
        Ok(())
    }

    fn delete(&mut self, keys: Vec<PoemKey>) -> Result<usize> {
        let keys: HashSet<PoemKey> = keys.into_iter().collect();
        let removed = self.store.delete(&keys)?;
        if self.selected.as_ref().is_some_and(|key| keys.contains(key)) {
            self.selected = None;
        }
        Ok(removed)
    }

    fn read_aloud(&mut self, key: PoemKey) -> Result<()> {
        let record = self
            .store
            .get(&key)
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        let segments = poem_segments(record);
        self.playback
            .start(segments, self.playback.rate(), self.playback.volume())?;
        self.selected = Some(key);
        Ok(())
    }

    fn remember_state(&self) {
        let Some(cache_root) = &self.cache_root else {
            return;
        };
        cache::save_session_state(cache_root, self.store.path(), &self.state());
    }
}

impl Drop for LibrarySession {
    fn drop(&mut self) {
        if self.playback.state() != PlaybackState::Idle {
            warn!("Library session closed during narration; stopping");
        }
        self.playback.stop();
    }
}
