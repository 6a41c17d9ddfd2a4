use crate::error::{Error, Result};
use crate::poem::PoemRecord;
use crate::store::{parse_poems, render_poems, write_atomic};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Accepts the store document or a bare array of records. Entries that do
/// not deserialize are skipped.
pub(super) fn read(path: &Path) -> Result<Vec<PoemRecord>> {
    let data = fs::read_to_string(path).map_err(|err| Error::storage(path, err))?;
    if let Ok(records) = parse_poems(&data) {
        return Ok(records);
    }

    let value: Value = serde_json::from_str(&data).map_err(|err| Error::storage(path, err))?;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("poems") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(Error::storage(path, "expected a 'poems' array")),
        },
        _ => return Err(Error::storage(path, "expected a 'poems' array")),
    };

    let mut records = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<PoemRecord>(entry) {
            Ok(record) => records.push(record),
            Err(err) => warn!(path = %path.display(), entry = idx, "Skipping malformed poem: {err}"),
        }
    }
    Ok(records)
}

pub(super) fn write(path: &Path, records: &[PoemRecord]) -> Result<()> {
    let payload = render_poems(records).map_err(|err| Error::storage(path, err))?;
    write_atomic(path, payload.as_bytes()).map_err(|err| Error::storage(path, err))
}
