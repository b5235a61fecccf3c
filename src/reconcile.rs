// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::Result;
use crate::ingest::decimal_col;
use crate::models::{MatchEvent, MatchType, Stats};
use rusqlite::{Connection, params};
use tracing::info;

pub fn stats(conn: &Connection) -> Result<Stats> {
    let total_transactions: i64 =
        conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?;
    let total_matches: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reconciliation_matches WHERE match_type != 'mismatch'",
        [],
        |r| r.get(0),
    )?;
    let reconciliation_rate = if total_transactions > 0 {
        (total_matches as f64 / total_transactions as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };
    Ok(Stats {
        total_transactions,
        total_matches,
        reconciliation_rate,
    })
}

/// Most recent outcomes first. A non-positive `limit` returns everything.
pub fn activity(conn: &Connection, limit: i64) -> Result<Vec<MatchEvent>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.match_type, t.amount, t.date, t.description, l.description, m.confidence_score \
         FROM reconciliation_matches m \
         JOIN transactions t ON t.id = m.transaction_id \
         LEFT JOIN internal_ledger l ON l.id = m.ledger_id \
         ORDER BY m.matched_at DESC, m.seq DESC LIMIT ?1",
    )?;
    let limit = if limit > 0 { limit } else { -1 };
    let rows = stmt.query_map(params![limit], |r| {
        let kind: String = r.get(1)?;
        let confidence: String = r.get(6)?;
        Ok(MatchEvent {
            id: r.get(0)?,
            match_type: kind.parse().unwrap_or(MatchType::Mismatch),
            amount: decimal_col(r, 2)?,
            date: r.get(3)?,
            bank_desc: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
            ledger_desc: r
                .get::<_, Option<String>>(5)?
                .unwrap_or_else(|| "-".to_string()),
            confidence: confidence.parse().unwrap_or(0.0),
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Removes every statement, transaction, ledger entry, and match.
pub fn clear(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM reconciliation_matches", [])?;
    tx.execute("DELETE FROM transactions", [])?;
    tx.execute("DELETE FROM internal_ledger", [])?;
    tx.execute("DELETE FROM bank_statements", [])?;
    tx.commit()?;
    info!("all reconciliation data cleared");
    Ok(())
}
