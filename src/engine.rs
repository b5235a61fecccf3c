// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The matching engine.
//!
//! Unmatched bank transactions are paired with unmatched ledger entries in
//! passes of decreasing strictness: same date, then a small date window,
//! then a wider window gated by description similarity. Whatever is left on
//! the bank side is recorded as a mismatch. Amounts match when equal or when
//! one is the negation of the other.

use crate::db::next_seq;
use crate::error::Result;
use crate::ingest::{decimal_col, ledger_from_row};
use crate::models::{BankTransaction, LedgerEntry, MatchEvent, MatchType, RunResult};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

pub const EXACT_CONFIDENCE: f64 = 1.0;
pub const FUZZY_DATE_CONFIDENCE: f64 = 0.85;
pub const MISMATCH_CONFIDENCE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Max day distance for `fuzzy_date`.
    pub date_window_days: i64,
    /// Max day distance for `fuzzy_desc`.
    pub desc_window_days: i64,
    /// Minimum token similarity for `fuzzy_desc`, in `[0, 1]`.
    pub desc_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            date_window_days: 2,
            desc_window_days: 7,
            desc_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pairing {
    pub bank_index: usize,
    pub ledger_index: Option<usize>,
    pub match_type: MatchType,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub result: RunResult,
    pub events: Vec<MatchEvent>,
}

fn amounts_match(a: Decimal, b: Decimal) -> bool {
    a == b || a == -b
}

fn tokens(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Jaccard similarity of the lowercase alphanumeric tokens of two descriptions.
pub fn description_similarity(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union as f64
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Pure pairing step. `bank` and `ledger` should already be in `(date, insertion)` order.
pub fn plan(bank: &[BankTransaction], ledger: &[LedgerEntry], cfg: &MatchConfig) -> Vec<Pairing> {
    let mut taken = vec![false; ledger.len()];
    let mut paired = vec![false; bank.len()];
    let mut out = Vec::new();

    let mut pass = |select: &dyn Fn(&BankTransaction, &[bool]) -> Option<(usize, MatchType, f64)>| {
        for (bi, b) in bank.iter().enumerate() {
            if paired[bi] {
                continue;
            }
            if let Some((li, match_type, confidence)) = select(b, taken.as_slice()) {
                taken[li] = true;
                paired[bi] = true;
                out.push(Pairing {
                    bank_index: bi,
                    ledger_index: Some(li),
                    match_type,
                    confidence,
                });
            }
        }
    };

    pass(&|b: &BankTransaction, taken: &[bool]| {
        ledger
            .iter()
            .enumerate()
            .find(|(li, l)| !taken[*li] && amounts_match(l.amount, b.amount) && l.date == b.date)
            .map(|(li, _)| (li, MatchType::Exact, EXACT_CONFIDENCE))
    });

    pass(&|b: &BankTransaction, taken: &[bool]| {
        ledger
            .iter()
            .enumerate()
            .filter(|(li, l)| !taken[*li] && amounts_match(l.amount, b.amount))
            .map(|(li, l)| (li, (l.date - b.date).num_days().abs()))
            .filter(|(_, gap)| *gap <= cfg.date_window_days)
            .min_by_key(|&(li, gap)| (gap, li))
            .map(|(li, _)| (li, MatchType::FuzzyDate, FUZZY_DATE_CONFIDENCE))
    });

    pass(&|b: &BankTransaction, taken: &[bool]| {
        let bank_desc = b.description.as_deref().unwrap_or("");
        let mut best: Option<(usize, f64, i64)> = None;
        for (li, l) in ledger.iter().enumerate() {
            if taken[li] || !amounts_match(l.amount, b.amount) {
                continue;
            }
            let gap = (l.date - b.date).num_days().abs();
            if gap > cfg.desc_window_days {
                continue;
            }
            let sim = description_similarity(bank_desc, l.description.as_deref().unwrap_or(""));
            if sim < cfg.desc_threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, bs, bg)) => sim > bs || (sim == bs && gap < bg),
            };
            if better {
                best = Some((li, sim, gap));
            }
        }
        best.map(|(li, sim, _)| (li, MatchType::FuzzyDesc, round2(0.5 + 0.3 * sim)))
    });

    for (bi, done) in paired.iter().enumerate() {
        if !done {
            out.push(Pairing {
                bank_index: bi,
                ledger_index: None,
                match_type: MatchType::Mismatch,
                confidence: MISMATCH_CONFIDENCE,
            });
        }
    }
    out
}

fn unmatched_bank(conn: &Connection) -> Result<Vec<BankTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.statement_id, t.date, t.amount, t.description, t.external_ref_id \
         FROM transactions t LEFT JOIN reconciliation_matches m ON m.transaction_id = t.id \
         WHERE m.id IS NULL ORDER BY t.date, t.seq",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(BankTransaction {
            id: r.get(0)?,
            statement_id: r.get(1)?,
            date: r.get(2)?,
            amount: decimal_col(r, 3)?,
            description: r.get(4)?,
            external_ref_id: r.get(5)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn unmatched_ledger(conn: &Connection) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.date, l.amount, l.description, l.gl_code \
         FROM internal_ledger l LEFT JOIN reconciliation_matches m ON m.ledger_id = l.id \
         WHERE m.id IS NULL ORDER BY l.date, l.seq",
    )?;
    let rows = stmt.query_map([], ledger_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Runs all passes and stores the outcome in one SQL transaction.
///
/// Mismatch rows from earlier runs are discarded first so that bank items
/// become eligible again once new ledger data arrives.
pub fn run(conn: &mut Connection, cfg: &MatchConfig) -> Result<RunOutcome> {
    let tx = conn.transaction()?;
    let cleared = tx.execute(
        "DELETE FROM reconciliation_matches WHERE match_type='mismatch'",
        [],
    )?;
    if cleared > 0 {
        debug!(cleared, "previous mismatches released");
    }

    let bank = unmatched_bank(&tx)?;
    let ledger = unmatched_ledger(&tx)?;
    let mut outcome = RunOutcome {
        result: RunResult {
            bank_items_scanned: bank.len(),
            ledger_items_scanned: ledger.len(),
            ..RunResult::default()
        },
        events: Vec::new(),
    };
    if bank.is_empty() {
        tx.commit()?;
        info!(ledger = ledger.len(), "nothing to reconcile");
        return Ok(outcome);
    }

    let pairings = plan(&bank, &ledger, cfg);
    let mut seq = next_seq(&tx, "reconciliation_matches")?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO reconciliation_matches(id, seq, transaction_id, ledger_id, match_type, confidence_score) \
             VALUES (?1,?2,?3,?4,?5,?6)",
        )?;
        for p in &pairings {
            let b = &bank[p.bank_index];
            let l = p.ledger_index.map(|i| &ledger[i]);
            let id = Uuid::new_v4().to_string();
            insert.execute(params![
                id,
                seq,
                b.id,
                l.map(|l| l.id.as_str()),
                p.match_type.as_str(),
                format!("{:.2}", p.confidence)
            ])?;
            seq += 1;

            if p.match_type.is_fuzzy() {
                outcome.result.fuzzy_matches += 1;
            } else if p.match_type == MatchType::Exact {
                outcome.result.exact_matches += 1;
            } else {
                outcome.result.mismatches += 1;
            }
            outcome.events.push(MatchEvent {
                id,
                match_type: p.match_type,
                amount: b.amount,
                date: b.date,
                bank_desc: b.description.clone().unwrap_or_default(),
                ledger_desc: l
                    .and_then(|l| l.description.clone())
                    .unwrap_or_else(|| "-".to_string()),
                confidence: p.confidence,
            });
        }
    }
    tx.commit()?;

    let r = &outcome.result;
    info!(
        bank = r.bank_items_scanned,
        ledger = r.ledger_items_scanned,
        exact = r.exact_matches,
        fuzzy = r.fuzzy_matches,
        mismatches = r.mismatches,
        "reconciliation run complete"
    );
    Ok(outcome)
}
