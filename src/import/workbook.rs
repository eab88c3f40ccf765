use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, DataType, Reader};
use thiserror::Error;
use time::{Date, Duration};

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("Error reading Excel file: {0}")]
    Unreadable(String),

    #[error("Excel file is empty")]
    Empty,
}

/// First worksheet split into its header row and the rows below it, every
/// cell rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reads `.xlsx` or `.xls` bytes. CPU bound; call from a blocking task.
pub fn read_first_sheet(bytes: Bytes) -> Result<Sheet, WorkbookError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| WorkbookError::Unreadable(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(WorkbookError::Empty)?
        .map_err(|e| WorkbookError::Unreadable(e.to_string()))?;

    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows.next().ok_or(WorkbookError::Empty)?;
    let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
    Ok(Sheet {
        headers,
        rows: rows.collect(),
    })
}

fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(serial) => serial_date(*serial)
            .map(|d| d.to_string())
            .unwrap_or_else(|| serial.to_string()),
        other => other.to_string(),
    }
}

/// Excel stores dates as days since 1899-12-30 (the 1900 leap-year bug is
/// folded into that epoch).
fn serial_date(serial: f64) -> Option<Date> {
    let epoch = Date::from_calendar_date(1899, time::Month::December, 30).ok()?;
    epoch.checked_add(Duration::days(serial.floor() as i64))
}
