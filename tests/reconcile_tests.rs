// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use autorec::engine::{self, MatchConfig};
use autorec::models::{MatchType, SourceFormat, UnifiedTransaction};
use autorec::{db, ingest, reconcile};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

fn row(day: u32, cents: i64, desc: &str) -> UnifiedTransaction {
    UnifiedTransaction {
        date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        amount: Decimal::new(cents, 2),
        description: desc.into(),
        external_ref_id: None,
        raw_source: None,
        gl_code: None,
        source_format: SourceFormat::Csv,
        confidence: 1.0,
    }
}

fn seeded() -> Connection {
    let mut conn = db::open_in_memory().unwrap();
    ingest::save_statement(
        &mut conn,
        "march.csv",
        "First Bank",
        None,
        &[
            row(1, -12050, "AWS EMEA"),
            row(3, 150000, "Acme Corp payment"),
            row(5, -4999, "Office supplies Staples"),
            row(9, -777, "Unknown charge"),
        ],
    )
    .unwrap();
    ingest::save_ledger(
        &mut conn,
        &[
            row(1, 12050, "Cloud hosting"),
            row(4, 150000, "Invoice 1001 Acme"),
            row(10, -4999, "Staples office supplies"),
        ],
    )
    .unwrap();
    conn
}

#[test]
fn run_classifies_and_persists_outcomes() {
    let mut conn = seeded();
    let outcome = engine::run(&mut conn, &MatchConfig::default()).unwrap();
    let r = &outcome.result;
    assert_eq!(r.bank_items_scanned, 4);
    assert_eq!(r.ledger_items_scanned, 3);
    assert_eq!(r.exact_matches, 1);
    assert_eq!(r.fuzzy_matches, 2);
    assert_eq!(r.mismatches, 1);
    assert_eq!(outcome.events.len(), 4);

    let by_desc = |d: &str| {
        outcome
            .events
            .iter()
            .find(|e| e.bank_desc == d)
            .unwrap()
            .clone()
    };
    assert_eq!(by_desc("AWS EMEA").match_type, MatchType::Exact);
    assert_eq!(by_desc("Acme Corp payment").match_type, MatchType::FuzzyDate);
    assert_eq!(by_desc("Office supplies Staples").match_type, MatchType::FuzzyDesc);
    let miss = by_desc("Unknown charge");
    assert_eq!(miss.match_type, MatchType::Mismatch);
    assert_eq!(miss.ledger_desc, "-");
    assert_eq!(miss.confidence, 0.0);

    let stats = reconcile::stats(&conn).unwrap();
    assert_eq!(stats.total_transactions, 4);
    assert_eq!(stats.total_matches, 3);
    assert_eq!(stats.reconciliation_rate, 75.0);
}

#[test]
fn second_run_only_sees_unmatched_items() {
    let mut conn = seeded();
    engine::run(&mut conn, &MatchConfig::default()).unwrap();

    ingest::save_ledger(&mut conn, &[row(9, -777, "Bank fee")]).unwrap();
    let again = engine::run(&mut conn, &MatchConfig::default()).unwrap();
    assert_eq!(again.result.bank_items_scanned, 1);
    assert_eq!(again.result.ledger_items_scanned, 1);
    assert_eq!(again.result.exact_matches, 1);
    assert_eq!(again.result.mismatches, 0);

    let stats = reconcile::stats(&conn).unwrap();
    assert_eq!(stats.total_matches, 4);
    assert_eq!(stats.reconciliation_rate, 100.0);

    let third = engine::run(&mut conn, &MatchConfig::default()).unwrap();
    assert_eq!(third.result.bank_items_scanned, 0);
    assert!(third.events.is_empty());
}

#[test]
fn activity_is_newest_first_and_limited() {
    let mut conn = seeded();
    let outcome = engine::run(&mut conn, &MatchConfig::default()).unwrap();

    let all = reconcile::activity(&conn, -1).unwrap();
    assert_eq!(all.len(), 4);
    let newest = outcome.events.last().unwrap();
    assert_eq!(all[0].id, newest.id);

    let two = reconcile::activity(&conn, 2).unwrap();
    assert_eq!(two.len(), 2);
    assert_eq!(two[0].id, all[0].id);
    assert_eq!(two[1].id, all[1].id);
}

#[test]
fn empty_database_has_zero_rate() {
    let conn = db::open_in_memory().unwrap();
    let stats = reconcile::stats(&conn).unwrap();
    assert_eq!(stats.total_transactions, 0);
    assert_eq!(stats.reconciliation_rate, 0.0);
    assert!(reconcile::activity(&conn, 10).unwrap().is_empty());
}

#[test]
fn clear_and_reset() {
    let mut conn = seeded();
    engine::run(&mut conn, &MatchConfig::default()).unwrap();

    ingest::reset_statements(&mut conn).unwrap();
    assert!(reconcile::activity(&conn, 0).unwrap().is_empty());
    assert_eq!(ingest::list_ledger(&conn).unwrap().len(), 3);

    reconcile::clear(&mut conn).unwrap();
    assert!(ingest::list_ledger(&conn).unwrap().is_empty());
    assert_eq!(reconcile::stats(&conn).unwrap().total_transactions, 0);
}
