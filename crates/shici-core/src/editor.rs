//! The editable text layout of a poem.
//!
//! The layout is: title pinyin, title, a blank line, then one pinyin line
//! above each content line. Editing happens on this text and `parse` turns
//! it back into fields.

use crate::phonetic::transliterate;
use crate::poem::{PoemPatch, PoemRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditedText {
    pub title_pinyin: String,
    pub title: String,
    pub content: Vec<String>,
    pub content_pinyin: Vec<String>,
}

impl EditedText {
    /// Patch carrying the parsed fields. Empty titles are left out so a
    /// mangled edit cannot blank the key.
    pub fn into_patch(self) -> PoemPatch {
        PoemPatch {
            title: Some(self.title).filter(|t| !t.trim().is_empty()),
            title_pinyin: Some(self.title_pinyin),
            content: Some(self.content),
            content_pinyin: Some(self.content_pinyin),
            ..PoemPatch::default()
        }
    }
}

/// Render `record` into the layout. Missing pinyin is transliterated so every
/// title and content line has a non-blank annotation above it.
pub fn render(record: &PoemRecord) -> String {
    let mut out = String::new();
    out.push_str(&annotation(record.title_pinyin.trim(), &record.title));
    out.push('\n');
    out.push_str(&record.title);
    out.push_str("\n\n");
    let aligned = record.content_pinyin.len() == record.content.len();
    for (idx, line) in record.content.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let given = if aligned { record.content_pinyin[idx].trim() } else { "" };
        out.push_str(&annotation(given, line));
        out.push('\n');
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn annotation(given: &str, text: &str) -> String {
    if given.is_empty() {
        transliterate(text)
    } else {
        given.to_string()
    }
}

/// Parse the layout back. The first non-empty line is the title pinyin and
/// the second the title; the remaining non-empty lines alternate pinyin,
/// content. A trailing unpaired pinyin line is dropped.
pub fn parse(text: &str) -> EditedText {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let title_pinyin = lines.next().unwrap_or_default().to_string();
    let title = lines.next().unwrap_or_default().to_string();

    let mut content = Vec::new();
    let mut content_pinyin = Vec::new();
    let mut pending_pinyin: Option<&str> = None;
    for line in lines {
        match pending_pinyin.take() {
            None => pending_pinyin = Some(line),
            Some(pinyin) => {
                content_pinyin.push(pinyin.to_string());
                content.push(line.to_string());
            }
        }
    }

    EditedText {
        title_pinyin,
        title,
        content,
        content_pinyin,
    }
}
