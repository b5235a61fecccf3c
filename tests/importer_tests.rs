// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use autorec::{cli, commands::importer, db, ingest};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::io::Write;
use tempfile::NamedTempFile;

fn file_with(suffix: &str, body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", body).unwrap();
    file.flush().unwrap();
    file
}

fn run_import(conn: &mut Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["autorec", "import"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    match matches.subcommand() {
        Some(("import", import_m)) => importer::handle(conn, import_m),
        _ => panic!("no import subcommand"),
    }
}

#[test]
fn statement_import_trims_path_and_stores_rows() {
    let mut conn = db::open_in_memory().unwrap();
    let file = file_with(
        ".csv",
        "Date,Description,Amount\n2024-03-01,AWS,-120.50\n2024-03-02,Client payment,\"1,500.00\"\nnot a date,skip me,1\n",
    );
    let padded = format!("  {}  ", file.path().to_str().unwrap());
    run_import(&mut conn, &["statement", "--path", &padded, "--bank", "First Bank"]).unwrap();

    let statements = ingest::list_statements(&conn, 0, 10).unwrap();
    assert_eq!(statements.len(), 1);
    let s = &statements[0];
    assert_eq!(s.bank_name, "First Bank");
    assert_eq!(s.format_type, "csv");
    assert_eq!(s.transactions.len(), 2);
    assert_eq!(s.transactions[0].amount, Decimal::new(-12050, 2));
    assert_eq!(s.transactions[1].amount, Decimal::new(150000, 2));
    assert_eq!(s.transactions[0].external_ref_id.as_deref(), Some("CSV-0"));
}

#[test]
fn debit_credit_columns_are_netted() {
    let mut conn = db::open_in_memory().unwrap();
    let file = file_with(
        ".csv",
        "Posting Date,Memo,Debit,Credit\n01/15/2024,Rent,900.00,\n01/16/2024,Refund,,25.00\n",
    );
    run_import(
        &mut conn,
        &["statement", "--path", file.path().to_str().unwrap(), "--bank", "B"],
    )
    .unwrap();
    let txs = ingest::list_bank_transactions(&conn).unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].amount, Decimal::new(-90000, 2));
    assert_eq!(txs[1].amount, Decimal::new(2500, 2));
    assert_eq!(txs[0].description.as_deref(), Some("Rent"));
}

const WORKBOOK: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/statement.xlsx");

#[test]
fn spreadsheet_import_reads_first_sheet() {
    let mut conn = db::open_in_memory().unwrap();
    run_import(&mut conn, &["statement", "--path", WORKBOOK, "--bank", "Sheet Bank"]).unwrap();

    let s = &ingest::list_statements(&conn, 0, 10).unwrap()[0];
    assert_eq!(s.format_type, "excel");
    // The balance row has no date and the second sheet is never read.
    assert_eq!(s.transactions.len(), 2);
    let (grocery, salary) = (&s.transactions[0], &s.transactions[1]);
    assert_eq!(grocery.date, NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
    assert_eq!(grocery.amount, Decimal::new(-15000, 2));
    assert_eq!(grocery.description.as_deref(), Some("Grocery"));
    assert_eq!(grocery.external_ref_id.as_deref(), Some("CSV-0"));
    assert_eq!(salary.date, NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
    assert_eq!(salary.amount, Decimal::new(320050, 2));
    assert_eq!(salary.external_ref_id.as_deref(), Some("CSV-1"));
}

#[test]
fn spreadsheet_ledger_import() {
    let mut conn = db::open_in_memory().unwrap();
    run_import(&mut conn, &["ledger", "--path", WORKBOOK]).unwrap();
    let ledger = ingest::list_ledger(&conn).unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[1].amount, Decimal::new(320050, 2));
    assert_eq!(ledger[1].gl_code.as_deref(), Some(ingest::DEFAULT_GL_CODE));
}

#[test]
fn mt940_statement_import() {
    let mut conn = db::open_in_memory().unwrap();
    let file = file_with(
        ".sta",
        ":20:REF\n:25:ACC\n:61:2402010201D150,25NTRFNONREF\n:86:AWS EMEA\n:61:240202C99,NTRFNONREF\n-\n",
    );
    run_import(
        &mut conn,
        &["statement", "--path", file.path().to_str().unwrap(), "--bank", "ING"],
    )
    .unwrap();
    let s = &ingest::list_statements(&conn, 0, 10).unwrap()[0];
    assert_eq!(s.format_type, "mt940");
    assert_eq!(s.transactions.len(), 2);
    assert_eq!(s.transactions[0].description.as_deref(), Some("AWS EMEA"));
    assert_eq!(s.transactions[1].amount, Decimal::from(99));
}

#[test]
fn ledger_import_reads_gl_codes() {
    let mut conn = db::open_in_memory().unwrap();
    let file = file_with(
        ".csv",
        "Date,Description,Amount,GL Code\n2024-03-01,Cloud hosting,120.50,6100\n2024-03-03,Misc,10,\n",
    );
    run_import(&mut conn, &["ledger", "--path", file.path().to_str().unwrap()]).unwrap();
    let ledger = ingest::list_ledger(&conn).unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].gl_code.as_deref(), Some("6100"));
    assert_eq!(ledger[1].gl_code.as_deref(), Some(ingest::DEFAULT_GL_CODE));
}

#[test]
fn unsupported_extension_is_rejected() {
    let mut conn = db::open_in_memory().unwrap();
    let file = file_with(".pdf", "%PDF-1.4");
    let err = run_import(
        &mut conn,
        &["statement", "--path", file.path().to_str().unwrap(), "--bank", "B"],
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("Unsupported file format"));
    assert!(ingest::list_statements(&conn, 0, 10).unwrap().is_empty());
}
