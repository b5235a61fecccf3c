// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Statement and ledger normalization.
//!
//! Every supported file format implements [`StatementParser`] and yields
//! [`UnifiedTransaction`] rows; [`normalize_file`] picks the parser from the
//! file extension.

pub mod csv;
pub mod excel;
pub mod mt940;
pub mod tabular;

use crate::error::{AppError, Result};
use crate::models::UnifiedTransaction;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use self::csv::CsvParser;
pub use self::excel::ExcelParser;
pub use self::mt940::Mt940Parser;

pub trait StatementParser {
    fn parse(&self, content: &[u8]) -> Result<Vec<UnifiedTransaction>>;
}

/// Header names to read from a tabular export. Missing entries fall back to
/// well-known column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: String,
    pub amount: String,
    pub description: String,
    #[serde(default)]
    pub debit: Option<String>,
    #[serde(default)]
    pub credit: Option<String>,
    #[serde(default)]
    pub gl_code: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            amount: "Amount".to_string(),
            description: "Description".to_string(),
            debit: None,
            credit: None,
            gl_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
    Mt940,
}

impl FileKind {
    pub fn detect(filename: &str) -> Result<Self> {
        let lower = filename.trim().to_ascii_lowercase();
        let ext = lower.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        match ext {
            "csv" => Ok(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "ods" => Ok(Self::Excel),
            "sta" | "txt" | "mt940" => Ok(Self::Mt940),
            _ => Err(AppError::UnsupportedFormat(filename.to_string())),
        }
    }
}

pub fn normalize_file(
    filename: &str,
    content: &[u8],
    mapping: Option<&ColumnMapping>,
) -> Result<Vec<UnifiedTransaction>> {
    let kind = FileKind::detect(filename)?;
    let mapping = mapping.cloned().unwrap_or_default();
    let result = match kind {
        FileKind::Csv => CsvParser::new(mapping).parse(content),
        FileKind::Excel => ExcelParser::new(mapping).parse(content),
        FileKind::Mt940 => Mt940Parser::new().parse(content),
    };
    match result {
        Ok(rows) => {
            debug!(filename, kind = ?kind, rows = rows.len(), "normalized file");
            Ok(rows)
        }
        Err(e) => {
            warn!(filename, error = %e, "failed to normalize file");
            match e {
                AppError::Parse(_) | AppError::UnsupportedFormat(_) => Err(e),
                other => Err(AppError::Parse(other.to_string())),
            }
        }
    }
}
