// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print JSON instead of a table")
}

fn path_arg() -> Arg {
    Arg::new("path")
        .long("path")
        .required(true)
        .help("File to read (.csv, .xlsx/.xls/.ods, .sta/.txt/.mt940)")
}

fn limit_arg(default: &'static str) -> Arg {
    Arg::new("limit")
        .long("limit")
        .value_parser(value_parser!(i64))
        .allow_negative_numbers(true)
        .default_value(default)
        .help("Maximum rows; 0 or less shows everything")
}

fn user_id_arg() -> Arg {
    Arg::new("id").required(true).help("User id")
}

fn remote_cmd() -> Command {
    Command::new("remote")
        .about("Talk to a running AutoRec service")
        .subcommand_required(true)
        .subcommand(
            Command::new("login")
                .about("Log in and store the session")
                .arg(
                    Arg::new("url")
                        .long("url")
                        .env("AUTOREC_URL")
                        .default_value(crate::client::DEFAULT_BASE_URL),
                )
                .arg(Arg::new("email").long("email").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("AUTOREC_PASSWORD")
                        .required(true)
                        .hide_env_values(true),
                )
                .arg(
                    Arg::new("remember")
                        .long("remember")
                        .action(ArgAction::SetTrue)
                        .help("Issue a 30 day token instead of 8 hours"),
                ),
        )
        .subcommand(Command::new("logout").about("Forget the stored session"))
        .subcommand(Command::new("stats").about("Dashboard totals").arg(json_flag()))
        .subcommand(
            Command::new("activity")
                .about("Recent match outcomes")
                .arg(limit_arg("10"))
                .arg(json_flag()),
        )
        .subcommand(Command::new("run").about("Trigger a reconciliation run").arg(json_flag()))
        .subcommand(Command::new("clear").about("Delete all reconciliation data"))
        .subcommand(
            Command::new("reset-statements")
                .about("Delete statements and matches, keeping the ledger"),
        )
        .subcommand(
            Command::new("statements")
                .about("List uploaded statements")
                .arg(
                    Arg::new("skip")
                        .long("skip")
                        .value_parser(value_parser!(i64))
                        .default_value("0"),
                )
                .arg(limit_arg("100"))
                .arg(json_flag()),
        )
        .subcommand(Command::new("ledger").about("List ledger entries").arg(json_flag()))
        .subcommand(
            Command::new("upload-statement")
                .about("Upload a bank statement")
                .arg(path_arg())
                .arg(Arg::new("bank").long("bank").required(true)),
        )
        .subcommand(
            Command::new("upload-ledger")
                .about("Upload an internal ledger export")
                .arg(path_arg()),
        )
        .subcommand(Command::new("users").about("List users").arg(json_flag()))
        .subcommand(
            Command::new("invite")
                .about("Invite a user by email")
                .arg(Arg::new("email").long("email").required(true))
                .arg(
                    Arg::new("role")
                        .long("role")
                        .value_parser(["standard", "superuser"])
                        .default_value("standard"),
                ),
        )
        .subcommand(
            Command::new("toggle")
                .about("Activate or deactivate a user")
                .arg(user_id_arg()),
        )
        .subcommand(
            Command::new("delete-user")
                .about("Delete a user")
                .arg(user_id_arg()),
        )
        .subcommand(
            Command::new("setup-password")
                .about("Set a password from an invitation token")
                .arg(
                    Arg::new("url")
                        .long("url")
                        .env("AUTOREC_URL")
                        .default_value(crate::client::DEFAULT_BASE_URL),
                )
                .arg(Arg::new("token").long("token").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .required(true)
                        .hide_env_values(true),
                ),
        )
}

pub fn build_cli() -> Command {
    Command::new("autorec")
        .about("Bank statement to ledger reconciliation")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .help("SQLite database file (default: AUTOREC_DB or the platform data dir)"),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP and WebSocket service")
                .arg(Arg::new("bind").long("bind").help("Listen address, e.g. 0.0.0.0:8000")),
        )
        .subcommand(
            Command::new("createsuperuser")
                .about("Create an administrator account")
                .arg(
                    Arg::new("email")
                        .long("email")
                        .env("AUTOREC_SUPERUSER_EMAIL")
                        .required(true),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("AUTOREC_SUPERUSER_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Normalize and store files locally")
                .subcommand_required(true)
                .subcommand(
                    Command::new("statement")
                        .about("Import a bank statement")
                        .arg(path_arg())
                        .arg(Arg::new("bank").long("bank").required(true)),
                )
                .subcommand(
                    Command::new("ledger")
                        .about("Import an internal ledger export")
                        .arg(path_arg()),
                ),
        )
        .subcommand(
            Command::new("reconcile")
                .about("Run matching and inspect results locally")
                .subcommand_required(true)
                .subcommand(Command::new("run").about("Match unreconciled items").arg(json_flag()))
                .subcommand(Command::new("stats").about("Totals and rate").arg(json_flag()))
                .subcommand(
                    Command::new("activity")
                        .about("Recent match outcomes")
                        .arg(limit_arg("10"))
                        .arg(json_flag()),
                )
                .subcommand(Command::new("clear").about("Delete all reconciliation data")),
        )
        .subcommand(
            Command::new("users")
                .about("Local user administration")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List users").arg(json_flag())),
        )
        .subcommand(remote_cmd())
}
