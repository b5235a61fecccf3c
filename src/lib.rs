// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod auth;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod live;
pub mod models;
pub mod parsers;
pub mod reconcile;
pub mod server;
pub mod users;
pub mod utils;
