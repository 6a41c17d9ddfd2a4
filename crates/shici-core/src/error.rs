//! Error taxonomy for the poem library core.
//!
//! Every failure is reported at the operation boundary; none of these are
//! meant to terminate the process.

use crate::playback::PlaybackState;
use crate::poem::PoemKey;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// File missing, unreadable, malformed, or not writable.
    #[error("storage error at {}: {message}", .path.display())]
    Storage { path: PathBuf, message: String },

    #[error("a poem titled '{}' by '{}' already exists", .0.title, .0.author)]
    DuplicateKey(PoemKey),

    #[error("no poem titled '{}' by '{}'", .0.title, .0.author)]
    NotFound(PoemKey),

    #[error("invalid poem record: {0}")]
    InvalidRecord(String),

    /// The conflict resolver chose to abort; nothing was merged.
    #[error("merge aborted on conflicting poem '{}' by '{}'", .0.title, .0.author)]
    MergeAborted(PoemKey),

    #[error("unsupported interchange format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot {operation} while playback is {state}")]
    InvalidState {
        operation: &'static str,
        state: PlaybackState,
    },

    #[error("speech engine unavailable: {0}")]
    EngineUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn storage(path: &Path, message: impl std::fmt::Display) -> Self {
        Error::Storage {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// True for failures a user can fix by changing input (no state changed).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DuplicateKey(_)
                | Error::NotFound(_)
                | Error::InvalidRecord(_)
                | Error::MergeAborted(_)
                | Error::InvalidState { .. }
        )
    }
}
