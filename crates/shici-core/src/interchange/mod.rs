//! Import and export of poem collections in external formats.
//!
//! JSON uses the store document shape. Delimited text and spreadsheets use a
//! header row of field names with multi-line fields joined by `|`.

mod delimited;
mod json;
mod spreadsheet;

use crate::error::{Error, Result};
use crate::phonetic::ensure_pinyin;
use crate::poem::PoemRecord;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub const LINE_JOINER: char = '|';

/// Column order for tabular formats.
pub const FIELDS: [&str; 10] = [
    "title",
    "author",
    "dynasty",
    "content",
    "content_pinyin",
    "title_pinyin",
    "translation",
    "note",
    "appreciation",
    "author_intro",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Delimited { delimiter: u8 },
    Spreadsheet,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Delimited { delimiter: b',' }),
            "tsv" => Ok(Format::Delimited { delimiter: b'\t' }),
            "xlsx" => Ok(Format::Spreadsheet),
            "" => Err(Error::UnsupportedFormat(path.display().to_string())),
            other => Err(Error::UnsupportedFormat(format!(".{other}"))),
        }
    }
}

/// Read records from `path`. Untitled records are dropped and pinyin is
/// filled in on the rest.
pub fn import(path: &Path) -> Result<Vec<PoemRecord>> {
    let format = Format::from_path(path)?;
    let raw = match format {
        Format::Json => json::read(path)?,
        Format::Delimited { delimiter } => delimited::read(path, delimiter)?,
        Format::Spreadsheet => spreadsheet::read(path)?,
    };
    let total = raw.len();
    let records: Vec<PoemRecord> = raw
        .into_iter()
        .filter(|record| !record.title.trim().is_empty())
        .map(ensure_pinyin)
        .collect();
    info!(
        path = %path.display(),
        ?format,
        imported = records.len(),
        dropped = total - records.len(),
        "Imported poems"
    );
    Ok(records)
}

pub fn export(path: &Path, records: &[PoemRecord]) -> Result<()> {
    let format = Format::from_path(path)?;
    match format {
        Format::Json => json::write(path, records)?,
        Format::Delimited { delimiter } => delimited::write(path, delimiter, records)?,
        Format::Spreadsheet => spreadsheet::write(path, records)?,
    }
    info!(path = %path.display(), ?format, count = records.len(), "Exported poems");
    Ok(())
}

/// Maps header cells to field positions; unknown headers are ignored.
#[derive(Debug)]
pub(crate) struct ColumnMap {
    columns: HashMap<&'static str, usize>,
}

impl ColumnMap {
    pub(crate) fn from_headers<'a>(
        path: &Path,
        headers: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut columns = HashMap::new();
        for (idx, header) in headers.into_iter().enumerate() {
            let name = header.trim().to_ascii_lowercase();
            match FIELDS.iter().find(|field| **field == name) {
                Some(field) => {
                    columns.entry(*field).or_insert(idx);
                }
                None => debug!(header = %header, "Ignoring unknown column"),
            }
        }
        if !columns.contains_key("title") {
            return Err(Error::storage(path, "header row has no 'title' column"));
        }
        Ok(Self { columns })
    }

    pub(crate) fn record<S: AsRef<str>>(&self, cells: &[S]) -> PoemRecord {
        let cell = |field: &str| -> String {
            self.columns
                .get(field)
                .and_then(|idx| cells.get(*idx))
                .map(|value| value.as_ref().trim().to_string())
                .unwrap_or_default()
        };
        PoemRecord {
            title: cell("title"),
            author: cell("author"),
            dynasty: cell("dynasty"),
            content: split_lines(&cell("content")),
            content_pinyin: split_lines(&cell("content_pinyin")),
            title_pinyin: cell("title_pinyin"),
            translation: cell("translation"),
            note: cell("note"),
            appreciation: cell("appreciation"),
            author_intro: cell("author_intro"),
        }
    }
}

/// Cells in `FIELDS` order.
pub(crate) fn record_cells(record: &PoemRecord) -> [String; 10] {
    [
        record.title.clone(),
        record.author.clone(),
        record.dynasty.clone(),
        join_lines(&record.content),
        join_lines(&record.content_pinyin),
        record.title_pinyin.clone(),
        record.translation.clone(),
        record.note.clone(),
        record.appreciation.clone(),
        record.author_intro.clone(),
    ]
}

fn join_lines(lines: &[String]) -> String {
    let mut joined = String::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            joined.push(LINE_JOINER);
        }
        joined.push_str(line);
    }
    joined
}

fn split_lines(cell: &str) -> Vec<String> {
    if cell.trim().is_empty() {
        return Vec::new();
    }
    cell.split(LINE_JOINER)
        .map(|line| line.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample() -> Vec<PoemRecord> {
        vec![
            PoemRecord::new(
                "静夜思",
                "李白",
                "唐",
                vec!["床前明月光，".into(), "疑是地上霜。".into()],
            ),
            PoemRecord::new("春晓", "孟浩然", "唐", vec!["春眠不觉晓，".into()]),
        ]
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::from_path(Path::new("a.JSON")).unwrap(), Format::Json);
        assert_eq!(
            Format::from_path(Path::new("a.tsv")).unwrap(),
            Format::Delimited { delimiter: b'\t' }
        );
        assert_eq!(
            Format::from_path(Path::new("dir/a.xlsx")).unwrap(),
            Format::Spreadsheet
        );
        assert!(matches!(
            Format::from_path(Path::new("a.txt")),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            Format::from_path(&PathBuf::from("noext")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn content_cells_join_with_bar() {
        let cells = record_cells(&sample()[0]);
        assert_eq!(cells[3], "床前明月光，|疑是地上霜。");
        assert_eq!(split_lines(&cells[3]), sample()[0].content);
        assert!(split_lines("  ").is_empty());
    }

    #[test]
    fn import_fills_pinyin_and_drops_untitled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poems.json");
        std::fs::write(
            &path,
            r#"{"poems": [
                {"title": "静夜思", "author": "李白", "content": ["床前明月光，"]},
                {"title": "  ", "author": "佚名"}
            ]}"#,
        )
        .unwrap();

        let records = import(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title_pinyin, "jìng yè sī");
        assert_eq!(records[0].content_pinyin.len(), 1);
    }

    #[test]
    fn every_format_exports_and_imports_the_same_poems() {
        let dir = TempDir::new().unwrap();
        for name in ["out.json", "out.csv", "out.tsv", "out.xlsx"] {
            let path = dir.path().join(name);
            export(&path, &sample()).unwrap();
            let back = import(&path).unwrap();
            assert_eq!(back.len(), 2, "{name}");
            assert_eq!(back[0].key(), sample()[0].key(), "{name}");
            assert_eq!(back[0].content, sample()[0].content, "{name}");
            assert_eq!(back[1].dynasty, "唐", "{name}");
        }
    }

    #[test]
    fn unsupported_export_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.doc");
        assert!(matches!(
            export(&path, &sample()),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(!path.exists());
    }
}
