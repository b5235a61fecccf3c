// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::tabular::{self, Grid};
use super::{ColumnMapping, StatementParser};
use crate::error::{AppError, Result};
use crate::models::{SourceFormat, UnifiedTransaction};
use calamine::{Data, Reader, Sheets};
use std::io::Cursor;

pub struct ExcelParser {
    mapping: ColumnMapping,
}

impl ExcelParser {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self { mapping }
    }
}

/// `None` when the serial falls outside the representable date range.
pub fn excel_serial_to_date(serial: f64) -> Option<String> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = chrono::Duration::try_days(serial as i64)?;
    let date = base.checked_add_signed(days)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn cell_text(c: &Data) -> String {
    match c {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        // An out-of-range date reads as blank so the row is skipped.
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).unwrap_or_default(),
        Data::DateTimeIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

impl StatementParser for ExcelParser {
    fn parse(&self, content: &[u8]) -> Result<Vec<UnifiedTransaction>> {
        let mut workbook: Sheets<_> = calamine::open_workbook_auto_from_rs(Cursor::new(content))
            .map_err(|e| AppError::Parse(format!("Could not read spreadsheet: {e}")))?;
        let first = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AppError::Parse("Spreadsheet has no sheets".to_string()))?;
        let range = workbook
            .worksheet_range(&first)
            .map_err(|e| AppError::Parse(format!("Could not read sheet '{first}': {e}")))?;

        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|r| r.iter().map(cell_text).collect())
            .unwrap_or_default();
        let grid = Grid {
            headers,
            rows: rows.map(|r| r.iter().map(cell_text).collect()).collect(),
        };
        tabular::normalize(&grid, &self.mapping, SourceFormat::Excel)
    }
}
