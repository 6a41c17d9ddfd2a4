use super::{ColumnMap, FIELDS, record_cells};
use crate::error::{Error, Result};
use crate::poem::PoemRecord;
use crate::store::write_atomic;
use calamine::{Reader, Xlsx, open_workbook};
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tracing::debug;

/// Reads the first worksheet.
pub(super) fn read(path: &Path) -> Result<Vec<PoemRecord>> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|err| Error::storage(path, err))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::storage(path, "workbook has no worksheets"))?
        .map_err(|err| Error::storage(path, err))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        debug!(path = %path.display(), "Empty worksheet");
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.iter().map(|cell| cell.to_string()).collect();
    let columns = ColumnMap::from_headers(path, header.iter().map(String::as_str))?;

    Ok(rows
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
            columns.record(&cells)
        })
        .collect())
}

pub(super) fn write(path: &Path, records: &[PoemRecord]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, field) in FIELDS.iter().enumerate() {
        sheet
            .write_string(0, col as u16, *field)
            .map_err(|err| Error::storage(path, err))?;
    }
    for (row, record) in records.iter().enumerate() {
        for (col, value) in record_cells(record).iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            sheet
                .write_string(row as u32 + 1, col as u16, value)
                .map_err(|err| Error::storage(path, err))?;
        }
    }
    let bytes = workbook
        .save_to_buffer()
        .map_err(|err| Error::storage(path, err))?;
    write_atomic(path, &bytes).map_err(|err| Error::storage(path, err))
}
