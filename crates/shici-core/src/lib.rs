//! Core of the classical poem viewer: the poem store, search and pinyin
//! ordering, favorites, interchange formats, and read-aloud playback.

pub mod bindings;
pub mod cache;
pub mod config;
pub mod editor;
pub mod error;
pub mod favorites;
pub mod interchange;
pub mod phonetic;
pub mod playback;
pub mod poem;
pub mod query;
pub mod session;
pub mod speech;
pub mod store;
pub mod text_utils;

pub use error::{Error, Result};
pub use favorites::FavoritesLedger;
pub use playback::{PlaybackController, PlaybackEvent, PlaybackState};
pub use poem::{PoemKey, PoemPatch, PoemRecord};
pub use query::{SearchCriteria, SortColumn, SortDirection, SortState};
pub use session::{CommandOutcome, LibraryCommand, LibraryEvent, LibrarySession, LibrarySnapshot};
pub use speech::{CommandEngineProvider, EngineProvider, SpeechEngine, Voice};
pub use store::{ConflictPolicy, ConflictResolver, MergeReport, PoemStore};
