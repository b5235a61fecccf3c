// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! SWIFT MT940 customer statements: `:61:` statement lines, each optionally
//! followed by a `:86:` information-to-account-owner block.

use super::StatementParser;
use crate::error::{AppError, Result};
use crate::models::{SourceFormat, UnifiedTransaction};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

static LINE_61: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^:61:(\d{6})(\d{4})?(R?[CD])([\d,]+)").expect("valid :61: pattern")
});

const NO_DESCRIPTION: &str = "No Description";

#[derive(Default)]
pub struct Mt940Parser;

impl Mt940Parser {
    pub fn new() -> Self {
        Self
    }
}

fn is_tag(line: &str) -> bool {
    let b = line.as_bytes();
    b.len() > 3 && b[0] == b':' && line[1..].find(':').is_some_and(|i| i <= 3)
}

struct Pending {
    tx: UnifiedTransaction,
    in_86: bool,
}

impl Pending {
    fn finish(mut self) -> UnifiedTransaction {
        let d = self.tx.description.trim();
        self.tx.description = if d.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            d.to_string()
        };
        self.tx
    }
}

fn parse_61(line: &str, index: usize) -> Result<Option<UnifiedTransaction>> {
    let Some(caps) = LINE_61.captures(line) else {
        return Ok(None);
    };
    let raw_date = &caps[1];
    let mark = &caps[3];
    let raw_amount = caps[4].replace(',', ".");

    let date = NaiveDate::parse_from_str(raw_date, "%y%m%d")
        .map_err(|e| AppError::Parse(format!("Invalid :61: value date '{raw_date}': {e}")))?;
    let mut amount = raw_amount
        .trim_end_matches('.')
        .parse::<Decimal>()
        .map_err(|e| AppError::Parse(format!("Invalid :61: amount '{}': {e}", &caps[4])))?;
    // D = debit, RC = reversal of credit; both reduce the balance.
    if mark == "D" || mark == "RC" {
        amount = -amount;
    }

    Ok(Some(UnifiedTransaction {
        date,
        amount,
        description: String::new(),
        external_ref_id: Some(format!("MT940-{}-{}", raw_date, index)),
        raw_source: Some(line.to_string()),
        gl_code: None,
        source_format: SourceFormat::Mt940,
        confidence: 1.0,
    }))
}

impl StatementParser for Mt940Parser {
    fn parse(&self, content: &[u8]) -> Result<Vec<UnifiedTransaction>> {
        let text = std::str::from_utf8(content)
            .map_err(|e| AppError::Parse(format!("MT940 file is not valid UTF-8: {e}")))?;

        let mut out = Vec::new();
        let mut current: Option<Pending> = None;

        for raw in text.lines() {
            let line = raw.trim();
            if line.starts_with(":61:") {
                if let Some(p) = current.take() {
                    out.push(p.finish());
                }
                current = parse_61(line, out.len())?.map(|tx| Pending { tx, in_86: false });
            } else if let Some(rest) = line.strip_prefix(":86:") {
                if let Some(p) = current.as_mut() {
                    p.tx.description = rest.trim().to_string();
                    p.in_86 = true;
                }
            } else if is_tag(line) || line.starts_with('-') {
                if let Some(p) = current.as_mut() {
                    p.in_86 = false;
                }
            } else if let Some(p) = current.as_mut().filter(|p| p.in_86 && !line.is_empty()) {
                p.tx.description.push(' ');
                p.tx.description.push_str(line);
            }
        }
        if let Some(p) = current.take() {
            out.push(p.finish());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = ":20:STARTUMS\n\
:25:DE12345678/0001234567\n\
:28C:00001/001\n\
:60F:C240131EUR1000,00\n\
:61:2402010201D150,25NTRFNONREF\n\
:86:AWS EMEA SARL\n\
INVOICE 2024-01\n\
:61:240202C1200,NTRFNONREF\n\
:61:240203RC10,00NTRFNONREF\n\
:86:REVERSAL\n\
:62F:C240203EUR2039,75\n\
-\n";

    #[test]
    fn parses_lines_and_descriptions() {
        let rows = Mt940Parser::new().parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(rows[0].amount, Decimal::new(-15025, 2));
        assert_eq!(rows[0].description, "AWS EMEA SARL INVOICE 2024-01");
        assert_eq!(rows[0].external_ref_id.as_deref(), Some("MT940-240201-0"));

        assert_eq!(rows[1].amount, Decimal::from(1200));
        assert_eq!(rows[1].description, NO_DESCRIPTION);

        assert_eq!(rows[2].amount, Decimal::new(-1000, 2));
        assert_eq!(rows[2].description, "REVERSAL");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(Mt940Parser::new().parse(b"").unwrap().is_empty());
    }
}
