// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use autorec::auth::TokenSigner;
use autorec::error::AppError;
use autorec::models::Role;
use autorec::users::{self, LogNotifier};
use autorec::{cli, commands, db, ingest};

#[test]
fn createsuperuser_command_then_login() {
    let conn = db::open_in_memory().unwrap();
    let matches = cli::build_cli().get_matches_from([
        "autorec",
        "createsuperuser",
        "--email",
        " Admin@Example.com ",
        "--password",
        "hunter22",
    ]);
    match matches.subcommand() {
        Some(("createsuperuser", sub)) => commands::users::create_superuser(&conn, sub).unwrap(),
        _ => panic!("no createsuperuser subcommand"),
    }

    let admin = users::find_by_email(&conn, "admin@example.com").unwrap().unwrap();
    assert_eq!(admin.role, Role::Superuser);

    let signer = TokenSigner::new("test-secret");
    let token = users::login(&conn, &signer, "ADMIN@example.com", "hunter22", false).unwrap();
    let me = users::authenticate(&conn, &signer, &token).unwrap();
    assert_eq!(me.id, admin.id);

    let err = users::login(&conn, &signer, "admin@example.com", "wrong", false).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[test]
fn invited_user_lifecycle() {
    let conn = db::open_in_memory().unwrap();
    let admin = users::create_superuser(&conn, "root@example.com", "pw").unwrap();
    let signer = TokenSigner::new("k");

    let inv = users::invite(
        &conn,
        "analyst@example.com",
        Role::Standard,
        "http://localhost:5173/",
        &LogNotifier,
    )
    .unwrap();
    assert!(inv.setup_link.starts_with("http://localhost:5173/setup-password?token="));
    let token = inv.setup_link.rsplit('=').next().unwrap().to_string();

    // No password yet.
    assert!(users::login(&conn, &signer, "analyst@example.com", "", false).is_err());

    users::setup_password(&conn, &token, "s3cret").unwrap();
    assert!(matches!(
        users::setup_password(&conn, &token, "again"),
        Err(AppError::BadRequest(_))
    ));
    let jwt = users::login(&conn, &signer, "analyst@example.com", "s3cret", true).unwrap();

    let analyst = users::find_by_email(&conn, "analyst@example.com").unwrap().unwrap();
    assert!(!users::toggle_status(&conn, &analyst.id, &admin).unwrap());
    assert!(users::authenticate(&conn, &signer, &jwt).is_err());
    assert!(matches!(
        users::login(&conn, &signer, "analyst@example.com", "s3cret", false),
        Err(AppError::Unauthorized(_))
    ));
    assert!(users::toggle_status(&conn, &analyst.id, &admin).unwrap());

    users::delete(&conn, &analyst.id, &admin).unwrap();
    assert!(users::find_by_id(&conn, &analyst.id).unwrap().is_none());
}

#[test]
fn self_service_and_owner_guards() {
    let mut conn = db::open_in_memory().unwrap();
    let admin = users::create_superuser(&conn, "root@example.com", "pw").unwrap();
    let other = users::create_superuser(&conn, "ops@example.com", "pw").unwrap();

    assert!(matches!(
        users::toggle_status(&conn, &admin.id, &admin),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        users::delete(&conn, &admin.id, &admin),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        users::delete(&conn, "missing", &admin),
        Err(AppError::NotFound(_))
    ));

    ingest::save_statement(&mut conn, "a.csv", "Bank", Some(&other.id), &[]).unwrap();
    assert!(matches!(
        users::delete(&conn, &other.id, &admin),
        Err(AppError::BadRequest(_))
    ));
    assert!(users::create_superuser(&conn, "OPS@example.com", "pw").is_err());
    assert_eq!(users::list(&conn).unwrap().len(), 2);
}
