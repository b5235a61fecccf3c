// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::ColumnMapping;
use crate::error::{AppError, Result};
use crate::models::{SourceFormat, UnifiedTransaction};
use crate::utils::{parse_amount, parse_flexible_date};
use rust_decimal::Decimal;

const DATE_GUESSES: &[&str] = &["Date", "Posting Date", "Trx Date", "date"];
const DESCRIPTION_GUESSES: &[&str] = &["Description", "Memo", "Details", "Narration"];
const DEBIT_GUESSES: &[&str] = &["Debit", "Dr", "Withdrawal", "Paid Out"];
const CREDIT_GUESSES: &[&str] = &["Credit", "Cr", "Deposit", "Paid In"];
const GL_GUESSES: &[&str] = &["GL Code", "GL", "Account Code"];

/// A header row plus string cells, the common shape of CSV and spreadsheet exports.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

enum AmountColumns {
    Single(usize),
    DebitCredit { debit: usize, credit: usize },
}

struct Columns {
    date: usize,
    description: Option<usize>,
    amount: AmountColumns,
    gl_code: Option<usize>,
}

impl Grid {
    fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name.trim())
    }

    fn first_of(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.position(n))
    }

    fn resolve(&self, mapping: &ColumnMapping) -> Result<Columns> {
        let date = self
            .position(&mapping.date)
            .or_else(|| self.first_of(DATE_GUESSES))
            .ok_or_else(|| {
                AppError::Parse(format!(
                    "Mapped column '{}' not found in headers: {:?}",
                    mapping.date, self.headers
                ))
            })?;

        let description = self
            .position(&mapping.description)
            .or_else(|| self.first_of(DESCRIPTION_GUESSES));

        let amount = if let Some(i) = self.position(&mapping.amount) {
            AmountColumns::Single(i)
        } else {
            let debit = mapping
                .debit
                .as_deref()
                .and_then(|n| self.position(n))
                .or_else(|| self.first_of(DEBIT_GUESSES));
            let credit = mapping
                .credit
                .as_deref()
                .and_then(|n| self.position(n))
                .or_else(|| self.first_of(CREDIT_GUESSES));
            match (debit, credit) {
                (Some(debit), Some(credit)) => AmountColumns::DebitCredit { debit, credit },
                _ => {
                    return Err(AppError::Parse(format!(
                        "Mapped column '{}' not found. Also could not find Debit/Credit pair.",
                        mapping.amount
                    )));
                }
            }
        };

        let gl_code = mapping
            .gl_code
            .as_deref()
            .and_then(|n| self.position(n))
            .or_else(|| self.first_of(GL_GUESSES));

        Ok(Columns {
            date,
            description,
            amount,
            gl_code,
        })
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.as_str()).unwrap_or("")
}

/// Converts a grid into normalized rows. Rows with an unreadable date or
/// amount (titles, balances, totals) are skipped.
pub fn normalize(
    grid: &Grid,
    mapping: &ColumnMapping,
    format: SourceFormat,
) -> Result<Vec<UnifiedTransaction>> {
    let cols = grid.resolve(mapping)?;

    let mut out = Vec::new();
    for (index, row) in grid.rows.iter().enumerate() {
        let Some(date) = parse_flexible_date(cell(row, cols.date)) else {
            continue;
        };

        let amount = match cols.amount {
            AmountColumns::Single(i) => match parse_amount(cell(row, i)) {
                Some(a) => a,
                None => continue,
            },
            AmountColumns::DebitCredit { debit, credit } => {
                let d_raw = cell(row, debit);
                let c_raw = cell(row, credit);
                let d = parse_amount(d_raw);
                let c = parse_amount(c_raw);
                // A non-blank cell that is not a number means this is not a data row.
                if (d.is_none() && !d_raw.trim().is_empty() && !d_raw.eq_ignore_ascii_case("nan"))
                    || (c.is_none()
                        && !c_raw.trim().is_empty()
                        && !c_raw.eq_ignore_ascii_case("nan"))
                {
                    continue;
                }
                c.unwrap_or(Decimal::ZERO) - d.unwrap_or(Decimal::ZERO)
            }
        };

        let description = cols
            .description
            .map(|i| cell(row, i).trim().to_string())
            .unwrap_or_default();
        let gl_code = cols
            .gl_code
            .map(|i| cell(row, i).trim().to_string())
            .filter(|s| !s.is_empty());

        out.push(UnifiedTransaction {
            date,
            amount,
            description,
            external_ref_id: Some(format!("CSV-{}", index)),
            raw_source: Some(row.join(",")),
            gl_code,
            source_format: format,
            confidence: 1.0,
        });
    }
    Ok(out)
}
