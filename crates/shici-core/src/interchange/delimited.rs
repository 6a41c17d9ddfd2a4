use super::{ColumnMap, FIELDS, record_cells};
use crate::error::{Error, Result};
use crate::poem::PoemRecord;
use crate::store::write_atomic;
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;
use tracing::warn;

pub(super) fn read(path: &Path, delimiter: u8) -> Result<Vec<PoemRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|err| Error::storage(path, err))?;
    let headers = reader
        .headers()
        .map_err(|err| Error::storage(path, err))?
        .clone();
    let columns = ColumnMap::from_headers(path, headers.iter())?;

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        match row {
            Ok(row) => {
                let cells: Vec<&str> = row.iter().collect();
                records.push(columns.record(&cells));
            }
            // Row numbers are 1-based and count the header.
            Err(err) => warn!(path = %path.display(), row = idx + 2, "Skipping malformed row: {err}"),
        }
    }
    Ok(records)
}

pub(super) fn write(path: &Path, delimiter: u8, records: &[PoemRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer
        .write_record(FIELDS)
        .map_err(|err| Error::storage(path, err))?;
    for record in records {
        writer
            .write_record(record_cells(record))
            .map_err(|err| Error::storage(path, err))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| Error::storage(path, err))?;
    write_atomic(path, &bytes).map_err(|err| Error::storage(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_columns_by_header_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poems.csv");
        fs::write(
            &path,
            "Author,Title,Extra,Content\n李白,静夜思,x,床前明月光，|疑是地上霜。\n孟浩然,,y,\n",
        )
        .unwrap();

        let records = read(&path, b',').unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "静夜思");
        assert_eq!(records[0].author, "李白");
        assert_eq!(records[0].content.len(), 2);
        assert!(records[1].title.is_empty());
    }

    #[test]
    fn missing_title_column_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poems.csv");
        fs::write(&path, "author,content\n李白,x\n").unwrap();
        assert!(matches!(read(&path, b','), Err(Error::Storage { .. })));
    }

    #[test]
    fn short_rows_leave_fields_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poems.tsv");
        fs::write(&path, "title\tauthor\tdynasty\n春晓\n").unwrap();

        let records = read(&path, b'\t').unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "春晓");
        assert!(records[0].dynasty.is_empty());
    }
}
