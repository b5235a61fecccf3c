// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::tabular::{self, Grid};
use super::{ColumnMapping, StatementParser};
use crate::error::Result;
use crate::models::{SourceFormat, UnifiedTransaction};
use csv::ReaderBuilder;

pub struct CsvParser {
    mapping: ColumnMapping,
}

impl CsvParser {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self { mapping }
    }
}

pub fn read_grid(content: &[u8]) -> Result<Grid> {
    let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);
    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        rows.push(rec.iter().map(|s| s.to_string()).collect());
    }
    Ok(Grid { headers, rows })
}

impl StatementParser for CsvParser {
    fn parse(&self, content: &[u8]) -> Result<Vec<UnifiedTransaction>> {
        let grid = read_grid(content)?;
        tabular::normalize(&grid, &self.mapping, SourceFormat::Csv)
    }
}
