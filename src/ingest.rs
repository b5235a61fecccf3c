// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Persisting normalized uploads and listing what has been stored.

use crate::db::next_seq;
use crate::error::{AppError, Result};
use crate::models::{BankStatement, BankTransaction, LedgerEntry, UnifiedTransaction};
use rusqlite::{Connection, Row, params, params_from_iter};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_GL_CODE: &str = "GL-000";

pub(crate) fn decimal_col(r: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = r.get(idx)?;
    s.parse::<Decimal>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub fn save_statement(
    conn: &mut Connection,
    filename: &str,
    bank_name: &str,
    uploaded_by: Option<&str>,
    rows: &[UnifiedTransaction],
) -> Result<BankStatement> {
    let bank_name = bank_name.trim();
    if bank_name.is_empty() {
        return Err(AppError::BadRequest("bank_name is required".into()));
    }
    let format_type = rows
        .first()
        .map(|r| r.source_format.as_str())
        .unwrap_or("unknown");
    let statement_id = Uuid::new_v4().to_string();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO bank_statements(id, filename, bank_name, format_type, uploaded_by) VALUES (?1,?2,?3,?4,?5)",
        params![statement_id, filename, bank_name, format_type, uploaded_by],
    )?;
    let mut seq = next_seq(&tx, "transactions")?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO transactions(id, seq, date, amount, description, external_ref_id, raw_source, statement_id) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        )?;
        for row in rows {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                seq,
                row.date.to_string(),
                row.amount.to_string(),
                row.description,
                row.external_ref_id,
                row.raw_source,
                statement_id
            ])?;
            seq += 1;
        }
    }
    tx.commit()?;
    info!(filename, bank_name, rows = rows.len(), "bank statement stored");

    get_statement(conn, &statement_id)?
        .ok_or_else(|| AppError::Internal(format!("statement {} vanished", statement_id)))
}

pub fn save_ledger(conn: &mut Connection, rows: &[UnifiedTransaction]) -> Result<Vec<LedgerEntry>> {
    let tx = conn.transaction()?;
    let mut seq = next_seq(&tx, "internal_ledger")?;
    let mut saved = Vec::with_capacity(rows.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO internal_ledger(id, seq, date, amount, description, gl_code) VALUES (?1,?2,?3,?4,?5,?6)",
        )?;
        for row in rows {
            let entry = LedgerEntry {
                id: Uuid::new_v4().to_string(),
                date: row.date,
                amount: row.amount,
                description: Some(row.description.clone()),
                gl_code: Some(
                    row.gl_code
                        .clone()
                        .unwrap_or_else(|| DEFAULT_GL_CODE.to_string()),
                ),
            };
            stmt.execute(params![
                entry.id,
                seq,
                entry.date.to_string(),
                entry.amount.to_string(),
                entry.description,
                entry.gl_code
            ])?;
            seq += 1;
            saved.push(entry);
        }
    }
    tx.commit()?;
    info!(rows = saved.len(), "ledger entries stored");
    Ok(saved)
}

fn statement_from_row(r: &Row<'_>) -> rusqlite::Result<BankStatement> {
    Ok(BankStatement {
        id: r.get(0)?,
        filename: r.get(1)?,
        bank_name: r.get(2)?,
        format_type: r.get(3)?,
        uploaded_at: r.get(4)?,
        uploaded_by: r.get(5)?,
        transactions: Vec::new(),
    })
}

fn transaction_from_row(r: &Row<'_>) -> rusqlite::Result<BankTransaction> {
    Ok(BankTransaction {
        id: r.get(0)?,
        statement_id: r.get(1)?,
        date: r.get(2)?,
        amount: decimal_col(r, 3)?,
        description: r.get(4)?,
        external_ref_id: r.get(5)?,
    })
}

const TX_COLS: &str = "id, statement_id, date, amount, description, external_ref_id";

pub fn get_statement(conn: &Connection, id: &str) -> Result<Option<BankStatement>> {
    let mut all = load_statements(conn, Some(id), 0, 1)?;
    Ok(all.pop())
}

pub fn list_statements(conn: &Connection, skip: i64, limit: i64) -> Result<Vec<BankStatement>> {
    load_statements(conn, None, skip, limit)
}

fn load_statements(
    conn: &Connection,
    only: Option<&str>,
    skip: i64,
    limit: i64,
) -> Result<Vec<BankStatement>> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, bank_name, format_type, uploaded_at, uploaded_by FROM bank_statements \
         WHERE (?1 IS NULL OR id=?1) ORDER BY uploaded_at, rowid LIMIT ?2 OFFSET ?3",
    )?;
    let limit = if limit <= 0 { -1 } else { limit };
    let rows = stmt.query_map(params![only, limit, skip.max(0)], statement_from_row)?;
    let mut statements = Vec::new();
    let mut index = HashMap::new();
    for row in rows {
        let s = row?;
        index.insert(s.id.clone(), statements.len());
        statements.push(s);
    }
    if statements.is_empty() {
        return Ok(statements);
    }

    // Only the transactions of the statements on this page.
    let placeholders = vec!["?"; statements.len()].join(",");
    let mut tx_stmt = conn.prepare(&format!(
        "SELECT {TX_COLS} FROM transactions WHERE statement_id IN ({placeholders}) ORDER BY seq"
    ))?;
    let ids = statements.iter().map(|s| s.id.clone()).collect::<Vec<_>>();
    let txs = tx_stmt.query_map(params_from_iter(ids), transaction_from_row)?;
    for t in txs {
        let t = t?;
        if let Some(&i) = index.get(&t.statement_id) {
            statements[i].transactions.push(t);
        }
    }
    Ok(statements)
}

pub fn list_bank_transactions(conn: &Connection) -> Result<Vec<BankTransaction>> {
    let mut stmt = conn.prepare(&format!("SELECT {TX_COLS} FROM transactions ORDER BY seq"))?;
    let rows = stmt.query_map([], transaction_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) fn ledger_from_row(r: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: r.get(0)?,
        date: r.get(1)?,
        amount: decimal_col(r, 2)?,
        description: r.get(3)?,
        gl_code: r.get(4)?,
    })
}

pub fn list_ledger(conn: &Connection) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, amount, description, gl_code FROM internal_ledger ORDER BY seq",
    )?;
    let rows = stmt.query_map([], ledger_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Deletes matches, bank transactions and statements. Ledger rows are kept.
pub fn reset_statements(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM reconciliation_matches", [])?;
    tx.execute("DELETE FROM transactions", [])?;
    tx.execute("DELETE FROM bank_statements", [])?;
    tx.commit()?;
    info!("bank statements reset");
    Ok(())
}
