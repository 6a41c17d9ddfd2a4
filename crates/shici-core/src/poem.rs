//! Poem records and their identity key.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Separator used by the legacy `"<title>_<author>"` key form.
pub const LEGACY_KEY_SEPARATOR: char = '_';

/// One poem. Field order here is the field order on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoemRecord {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub dynasty: String,
    #[serde(default, deserialize_with = "lines_or_text")]
    pub content: Vec<String>,
    #[serde(default, deserialize_with = "lines_or_text")]
    pub content_pinyin: Vec<String>,
    #[serde(default)]
    pub title_pinyin: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub appreciation: String,
    #[serde(default)]
    pub author_intro: String,
}

impl PoemRecord {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        dynasty: impl Into<String>,
        content: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            dynasty: dynasty.into(),
            content,
            ..Self::default()
        }
    }

    pub fn key(&self) -> PoemKey {
        PoemKey::new(self.title.clone(), self.author.clone())
    }

    pub fn matches_key(&self, key: &PoemKey) -> bool {
        self.title == key.title && self.author == key.author
    }

    /// Pinyin lines are usable only when present, not all blank, and aligned
    /// one-to-one with the content lines.
    pub fn has_aligned_pinyin(&self) -> bool {
        self.content_pinyin.len() == self.content.len()
            && self.content_pinyin.iter().any(|line| !line.trim().is_empty())
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidRecord("title must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Identity of a poem: the `(title, author)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PoemKey {
    pub title: String,
    pub author: String,
}

impl PoemKey {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }
}

impl fmt::Display for PoemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.title, LEGACY_KEY_SEPARATOR, self.author)
    }
}

/// Parses the legacy `"<title>_<author>"` form. The last separator wins, so
/// titles may contain underscores but authors may not.
impl FromStr for PoemKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (title, author) = s.rsplit_once(LEGACY_KEY_SEPARATOR).unwrap_or((s, ""));
        if title.is_empty() {
            return Err(Error::InvalidRecord(format!("key '{s}' has no title")));
        }
        Ok(PoemKey::new(title, author))
    }
}

/// Partial update applied by `PoemStore::update`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PoemPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub dynasty: Option<String>,
    pub content: Option<Vec<String>>,
    pub content_pinyin: Option<Vec<String>>,
    pub title_pinyin: Option<String>,
    pub translation: Option<String>,
    pub note: Option<String>,
    pub appreciation: Option<String>,
    pub author_intro: Option<String>,
}

impl PoemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.dynasty.is_none()
            && self.content.is_none()
            && self.content_pinyin.is_none()
            && self.title_pinyin.is_none()
            && self.translation.is_none()
            && self.note.is_none()
            && self.appreciation.is_none()
            && self.author_intro.is_none()
    }

    /// Key the record will have once this patch is applied.
    pub fn resulting_key(&self, current: &PoemKey) -> PoemKey {
        PoemKey::new(
            self.title.clone().unwrap_or_else(|| current.title.clone()),
            self.author.clone().unwrap_or_else(|| current.author.clone()),
        )
    }

    pub fn apply_to(self, record: &mut PoemRecord) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(author) = self.author {
            record.author = author;
        }
        if let Some(dynasty) = self.dynasty {
            record.dynasty = dynasty;
        }
        if let Some(content) = self.content {
            record.content = content;
        }
        if let Some(content_pinyin) = self.content_pinyin {
            record.content_pinyin = content_pinyin;
        }
        if let Some(title_pinyin) = self.title_pinyin {
            record.title_pinyin = title_pinyin;
        }
        if let Some(translation) = self.translation {
            record.translation = translation;
        }
        if let Some(note) = self.note {
            record.note = note;
        }
        if let Some(appreciation) = self.appreciation {
            record.appreciation = appreciation;
        }
        if let Some(author_intro) = self.author_intro {
            record.author_intro = author_intro;
        }
    }
}

/// Older files store `content` as one newline-separated string.
fn lines_or_text<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LinesOrText {
        Lines(Vec<String>),
        Text(String),
        Missing(()),
    }

    Ok(match LinesOrText::deserialize(deserializer)? {
        LinesOrText::Lines(lines) => lines,
        LinesOrText::Text(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        LinesOrText::Missing(()) => Vec::new(),
    })
}
