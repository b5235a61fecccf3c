// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "AutoRec", "autorec"));

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")
}

pub fn default_db_path() -> Result<PathBuf> {
    let proj = project_dirs()?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("autorec.sqlite"))
}

pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    init_schema(&mut conn)?;
    Ok(conn)
}

fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users(
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT,          -- NULL until an invited user sets one
        role TEXT NOT NULL DEFAULT 'standard' CHECK(role IN ('standard','superuser')),
        is_active INTEGER NOT NULL DEFAULT 1,
        invite_token TEXT UNIQUE,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS bank_statements(
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        bank_name TEXT NOT NULL,
        format_type TEXT NOT NULL,
        uploaded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f','now')),
        uploaded_by TEXT,
        FOREIGN KEY(uploaded_by) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id TEXT PRIMARY KEY,
        seq INTEGER NOT NULL,
        date TEXT NOT NULL,
        amount TEXT NOT NULL,
        description TEXT,
        external_ref_id TEXT,
        raw_source TEXT,
        statement_id TEXT NOT NULL,
        FOREIGN KEY(statement_id) REFERENCES bank_statements(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
    CREATE INDEX IF NOT EXISTS idx_transactions_ref ON transactions(external_ref_id);

    CREATE TABLE IF NOT EXISTS internal_ledger(
        id TEXT PRIMARY KEY,
        seq INTEGER NOT NULL,
        date TEXT NOT NULL,
        amount TEXT NOT NULL,
        description TEXT,
        gl_code TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_ledger_date ON internal_ledger(date);

    -- ledger_id is NULL for mismatches; SQLite UNIQUE admits many NULLs
    CREATE TABLE IF NOT EXISTS reconciliation_matches(
        id TEXT PRIMARY KEY,
        seq INTEGER NOT NULL,
        transaction_id TEXT NOT NULL UNIQUE,
        ledger_id TEXT UNIQUE,
        match_type TEXT NOT NULL CHECK(match_type IN ('exact','fuzzy_date','fuzzy_desc','mismatch')),
        confidence_score TEXT NOT NULL,
        matched_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f','now')),
        FOREIGN KEY(transaction_id) REFERENCES transactions(id) ON DELETE CASCADE,
        FOREIGN KEY(ledger_id) REFERENCES internal_ledger(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_matches_matched_at ON reconciliation_matches(matched_at);
    "#,
    )?;
    Ok(())
}

/// Next value of the per-table insertion counter used for stable ordering.
pub fn next_seq(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COALESCE(MAX(seq), 0) + 1 FROM {}", table),
        [],
        |r| r.get(0),
    )
}
