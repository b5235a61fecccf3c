// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Config;
use crate::models::{MatchEvent, RunResult, Stats};
use crate::utils::{maybe_print_json, pretty_table};
use crate::{engine, reconcile};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, config: &Config, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("run", sub)) => {
            let outcome = engine::run(conn, &config.matching)?;
            print_run(&outcome.result, sub.get_flag("json"))
        }
        Some(("stats", sub)) => print_stats(&reconcile::stats(conn)?, sub.get_flag("json")),
        Some(("activity", sub)) => {
            let limit = *sub.get_one::<i64>("limit").unwrap();
            print_activity(&reconcile::activity(conn, limit)?, sub.get_flag("json"))
        }
        Some(("clear", _)) => {
            reconcile::clear(conn)?;
            println!("All data cleared");
            Ok(())
        }
        _ => Ok(()),
    }
}

pub fn print_run(r: &RunResult, json: bool) -> Result<()> {
    if maybe_print_json(json, r)? {
        return Ok(());
    }
    let rows = vec![
        vec!["Bank items scanned".into(), r.bank_items_scanned.to_string()],
        vec!["Ledger items scanned".into(), r.ledger_items_scanned.to_string()],
        vec!["Exact matches".into(), r.exact_matches.to_string()],
        vec!["Fuzzy matches".into(), r.fuzzy_matches.to_string()],
        vec!["Mismatches".into(), r.mismatches.to_string()],
    ];
    println!("{}", pretty_table(&["Metric", "Value"], rows));
    Ok(())
}

pub fn print_stats(s: &Stats, json: bool) -> Result<()> {
    if maybe_print_json(json, s)? {
        return Ok(());
    }
    let rows = vec![
        vec!["Bank transactions".into(), s.total_transactions.to_string()],
        vec!["Matched".into(), s.total_matches.to_string()],
        vec!["Reconciliation rate".into(), format!("{:.1}%", s.reconciliation_rate)],
    ];
    println!("{}", pretty_table(&["Metric", "Value"], rows));
    Ok(())
}

pub fn print_activity(events: &[MatchEvent], json: bool) -> Result<()> {
    if maybe_print_json(json, &events)? {
        return Ok(());
    }
    if events.is_empty() {
        println!("No reconciliation activity yet.");
        return Ok(());
    }
    let rows = events
        .iter()
        .map(|e| {
            vec![
                e.date.to_string(),
                e.match_type.to_string(),
                e.amount.to_string(),
                e.bank_desc.clone(),
                e.ledger_desc.clone(),
                format!("{:.2}", e.confidence),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Date", "Type", "Amount", "Bank", "Ledger", "Confidence"],
            rows
        )
    );
    Ok(())
}
