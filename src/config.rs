// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::MatchConfig;
use crate::live;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub bind: SocketAddr,
    /// `None` means a random per-process key (tokens die with the process).
    pub secret_key: Option<String>,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub broadcast_delay: Duration,
    pub max_upload_bytes: usize,
    pub feed_capacity: usize,
    pub matching: MatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            bind: DEFAULT_BIND.parse().unwrap_or_else(|_| ([127, 0, 0, 1], 8000).into()),
            secret_key: None,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            cors_origins: vec![
                DEFAULT_FRONTEND_URL.to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            broadcast_delay: Duration::ZERO,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            feed_capacity: live::DEFAULT_CAPACITY,
            matching: MatchConfig::default(),
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid value '{}' for {}", v, key)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(p) = parsed::<PathBuf>(&lookup, "AUTOREC_DB")? {
            cfg.db_path = Some(p);
        }
        if let Some(b) = parsed(&lookup, "AUTOREC_BIND")? {
            cfg.bind = b;
        }
        cfg.secret_key = parsed(&lookup, "AUTOREC_SECRET_KEY")?;
        if let Some(url) = parsed::<String>(&lookup, "AUTOREC_FRONTEND_URL")? {
            cfg.frontend_url = url.trim_end_matches('/').to_string();
            cfg.cors_origins = vec![cfg.frontend_url.clone()];
        }
        if let Some(list) = parsed::<String>(&lookup, "AUTOREC_CORS_ORIGINS")? {
            cfg.cors_origins = list
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(ms) = parsed::<u64>(&lookup, "AUTOREC_BROADCAST_DELAY_MS")? {
            cfg.broadcast_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parsed(&lookup, "AUTOREC_MAX_UPLOAD_BYTES")? {
            cfg.max_upload_bytes = n;
        }
        if let Some(n) = parsed(&lookup, "AUTOREC_FEED_CAPACITY")? {
            cfg.feed_capacity = n;
        }
        if let Some(n) = parsed(&lookup, "AUTOREC_DATE_WINDOW_DAYS")? {
            cfg.matching.date_window_days = n;
        }
        if let Some(n) = parsed(&lookup, "AUTOREC_DESC_WINDOW_DAYS")? {
            cfg.matching.desc_window_days = n;
        }
        if let Some(t) = parsed::<f64>(&lookup, "AUTOREC_DESC_THRESHOLD")? {
            anyhow::ensure!(
                (0.0..=1.0).contains(&t),
                "AUTOREC_DESC_THRESHOLD must be within 0..=1"
            );
            cfg.matching.desc_threshold = t;
        }
        Ok(cfg)
    }

    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(p.clone()),
            None => crate::db::default_db_path(),
        }
    }
}
