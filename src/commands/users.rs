// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::User;
use crate::users;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(conn, sub.get_flag("json")),
        _ => Ok(()),
    }
}

pub fn create_superuser(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let email = m.get_one::<String>("email").unwrap().trim();
    let password = m.get_one::<String>("password").unwrap();
    let user = users::create_superuser(conn, email, password)
        .with_context(|| format!("Create superuser {}", email))?;
    println!("Superuser {} created (id {})", user.email, user.id);
    Ok(())
}

fn user_rows(list: &[User]) -> Vec<Vec<String>> {
    list.iter()
        .map(|u| {
            vec![
                u.id.clone(),
                u.email.clone(),
                u.role.to_string(),
                if u.is_active { "active" } else { "disabled" }.to_string(),
            ]
        })
        .collect()
}

pub fn print_users(list: &[User], json: bool) -> Result<()> {
    if maybe_print_json(json, &list)? {
        return Ok(());
    }
    println!(
        "{}",
        pretty_table(&["Id", "Email", "Role", "Status"], user_rows(list))
    );
    Ok(())
}

fn list(conn: &Connection, json: bool) -> Result<()> {
    let all = users::list(conn)?;
    print_users(&all, json)
}
