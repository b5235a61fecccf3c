// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::reconcile::{print_activity, print_run, print_stats};
use super::users::print_users;
use crate::client::{ApiClient, ClientError, Session};
use crate::models::{BankStatement, LedgerEntry, Role};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing::debug;

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    handle_with_session(m, &Session::default_path()?)
}

/// Same as [`handle`] with an explicit session file location.
pub fn handle_with_session(m: &clap::ArgMatches, session_path: &Path) -> Result<()> {
    match m.subcommand() {
        Some(("login", sub)) => login(sub, session_path),
        Some(("logout", _)) => {
            if Session::clear(session_path)? {
                println!("Logged out.");
            } else {
                println!("No stored session.");
            }
            Ok(())
        }
        Some(("setup-password", sub)) => {
            let client = ApiClient::new(sub.get_one::<String>("url").unwrap())?;
            let token = sub.get_one::<String>("token").unwrap().trim();
            let password = sub.get_one::<String>("password").unwrap();
            let res = client.setup_password(token, password)?;
            println!("{}", res.message);
            Ok(())
        }
        Some((name, sub)) => {
            let session = Session::load(session_path)?
                .ok_or_else(|| anyhow!("Not logged in. Run `autorec remote login` first."))?;
            let client = ApiClient::from_session(&session)?;
            match authed(&client, name, sub) {
                Err(ClientError::Unauthorized) => {
                    Session::clear(session_path)?;
                    debug!(path = %session_path.display(), "stale session removed");
                    Err(ClientError::Unauthorized.into())
                }
                other => other?,
            }
        }
        None => Ok(()),
    }
}

fn login(sub: &clap::ArgMatches, session_path: &Path) -> Result<()> {
    let url = sub.get_one::<String>("url").unwrap();
    let email = sub.get_one::<String>("email").unwrap().trim();
    let password = sub.get_one::<String>("password").unwrap();
    let mut client = ApiClient::new(url)?;
    let token = client
        .login(email, password, sub.get_flag("remember"))
        .with_context(|| format!("Log in to {}", client.base_url()))?;
    Session {
        base_url: client.base_url().to_string(),
        token,
    }
    .save(session_path)?;
    println!("Logged in as {} at {}", email, client.base_url());
    Ok(())
}

/// Runs one authenticated command. Client errors are kept apart from local
/// (printing) errors so that a 401 can be detected by the caller.
fn authed(
    client: &ApiClient,
    name: &str,
    sub: &clap::ArgMatches,
) -> std::result::Result<Result<()>, ClientError> {
    let json = sub.try_get_one::<bool>("json").ok().flatten().copied().unwrap_or(false);
    Ok(match name {
        "stats" => print_stats(&client.stats()?, json),
        "activity" => {
            let limit = *sub.get_one::<i64>("limit").unwrap();
            print_activity(&client.activity(limit)?, json)
        }
        "run" => print_run(&client.run()?.results, json),
        "clear" => {
            println!("{}", client.clear()?.message);
            Ok(())
        }
        "reset-statements" => {
            client.reset_statements()?;
            println!("Statements reset");
            Ok(())
        }
        "statements" => {
            let skip = *sub.get_one::<i64>("skip").unwrap();
            let limit = *sub.get_one::<i64>("limit").unwrap();
            print_statements(&client.list_statements(skip, limit)?, json)
        }
        "ledger" => print_ledger(&client.list_ledger()?, json),
        "upload-statement" => {
            let path = Path::new(sub.get_one::<String>("path").unwrap().trim());
            let bank = sub.get_one::<String>("bank").unwrap();
            let s = client.upload_statement(path, bank)?;
            println!(
                "Uploaded {} ({} transactions, {})",
                s.filename,
                s.transactions.len(),
                s.format_type
            );
            Ok(())
        }
        "upload-ledger" => {
            let path = Path::new(sub.get_one::<String>("path").unwrap().trim());
            let saved = client.upload_ledger(path)?;
            println!("Uploaded {} ledger entries", saved.len());
            Ok(())
        }
        "users" => print_users(&client.list_users()?, json),
        "invite" => {
            let email = sub.get_one::<String>("email").unwrap().trim();
            let role: Role = sub
                .get_one::<String>("role")
                .map(|r| r.parse().unwrap_or_default())
                .unwrap_or_default();
            let inv = client.invite_user(email, role)?;
            println!("Invited {}. Setup link: {}", inv.email, inv.setup_link);
            Ok(())
        }
        "toggle" => {
            let id = sub.get_one::<String>("id").unwrap();
            let res = client.toggle_user(id)?;
            let state = if res.is_active { "active" } else { "disabled" };
            println!("User {} is now {}", id, state);
            Ok(())
        }
        "delete-user" => {
            let id = sub.get_one::<String>("id").unwrap();
            println!("{}", client.delete_user(id)?.message);
            Ok(())
        }
        other => Err(anyhow!("Unknown remote command '{}'", other)),
    })
}

fn print_statements(list: &[BankStatement], json: bool) -> Result<()> {
    if maybe_print_json(json, &list)? {
        return Ok(());
    }
    let rows = list
        .iter()
        .map(|s| {
            vec![
                s.uploaded_at.format("%Y-%m-%d %H:%M").to_string(),
                s.bank_name.clone(),
                s.filename.clone(),
                s.format_type.clone(),
                s.transactions.len().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Uploaded", "Bank", "File", "Format", "Transactions"], rows)
    );
    Ok(())
}

fn print_ledger(list: &[LedgerEntry], json: bool) -> Result<()> {
    if maybe_print_json(json, &list)? {
        return Ok(());
    }
    let rows = list
        .iter()
        .map(|l| {
            vec![
                l.date.to_string(),
                l.amount.to_string(),
                l.description.clone().unwrap_or_default(),
                l.gl_code.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Date", "Amount", "Description", "GL Code"], rows)
    );
    Ok(())
}
