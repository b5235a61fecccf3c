// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::{ingest, parsers};
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("statement", sub)) => import_statement(conn, sub),
        Some(("ledger", sub)) => import_ledger(conn, sub),
        _ => Ok(()),
    }
}

/// Reads and normalizes a file, keeping only its file name for detection and storage.
fn read_normalized(path: &str) -> Result<(String, Vec<crate::models::UnifiedTransaction>)> {
    let path = Path::new(path);
    let content = std::fs::read(path).with_context(|| format!("Open {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file: {}", path.display()))?;
    let rows = parsers::normalize_file(&filename, &content, None)
        .with_context(|| format!("Normalize {}", path.display()))?;
    Ok((filename, rows))
}

fn import_statement(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let path = sub.get_one::<String>("path").unwrap().trim();
    let bank = sub.get_one::<String>("bank").unwrap();
    let (filename, rows) = read_normalized(path)?;
    let statement = ingest::save_statement(conn, &filename, bank, None, &rows)?;
    println!(
        "Imported {} transactions from {} ({}, {})",
        statement.transactions.len(),
        statement.filename,
        statement.bank_name,
        statement.format_type
    );
    Ok(())
}

fn import_ledger(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let path = sub.get_one::<String>("path").unwrap().trim();
    let (filename, rows) = read_normalized(path)?;
    let saved = ingest::save_ledger(conn, &rows)?;
    println!("Imported {} ledger entries from {}", saved.len(), filename);
    Ok(())
}
