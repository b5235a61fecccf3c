// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use autorec::{cli, commands, config::Config, db};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("autorec=info,tower_http=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let matches = cli::build_cli().get_matches();

    let mut config = Config::from_env()?;
    if let Some(path) = matches.get_one::<String>("db") {
        config.db_path = Some(PathBuf::from(path.trim()));
    }

    match matches.subcommand() {
        Some(("serve", sub)) => commands::serve::handle(config, sub)?,
        Some(("remote", sub)) => commands::remote::handle(sub)?,
        Some((name, sub)) => {
            let mut conn = db::open(&config.resolved_db_path()?)?;
            match name {
                "createsuperuser" => commands::users::create_superuser(&conn, sub)?,
                "import" => commands::importer::handle(&mut conn, sub)?,
                "reconcile" => commands::reconcile::handle(&mut conn, &config, sub)?,
                "users" => commands::users::handle(&conn, sub)?,
                _ => {}
            }
        }
        None => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
