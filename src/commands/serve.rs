// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Config;
use crate::server;
use anyhow::{Context, Result};

pub fn apply_overrides(config: &mut Config, m: &clap::ArgMatches) -> Result<()> {
    if let Some(bind) = m.get_one::<String>("bind") {
        config.bind = bind
            .trim()
            .parse()
            .with_context(|| format!("Invalid --bind address '{}'", bind.trim()))?;
    }
    Ok(())
}

pub fn handle(mut config: Config, m: &clap::ArgMatches) -> Result<()> {
    apply_overrides(&mut config, m)?;
    let rt = tokio::runtime::Runtime::new().context("Start async runtime")?;
    rt.block_on(server::serve(config))
}
