// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Superuser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Superuser => "superuser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "superuser" => Ok(Self::Superuser),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

impl User {
    pub fn is_superuser(&self) -> bool {
        self.role == Role::Superuser
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Excel,
    Mt940,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
            Self::Mt940 => "mt940",
        }
    }
}

/// Normalized row produced by every statement parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTransaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub external_ref_id: Option<String>,
    pub raw_source: Option<String>,
    pub gl_code: Option<String>,
    pub source_format: SourceFormat,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: String,
    pub statement_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: Option<String>,
    pub external_ref_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatement {
    pub id: String,
    pub filename: String,
    pub bank_name: String,
    pub format_type: String,
    pub uploaded_at: NaiveDateTime,
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub transactions: Vec<BankTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: Option<String>,
    pub gl_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    FuzzyDate,
    FuzzyDesc,
    Mismatch,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::FuzzyDate => "fuzzy_date",
            Self::FuzzyDesc => "fuzzy_desc",
            Self::Mismatch => "mismatch",
        }
    }

    pub fn is_fuzzy(&self) -> bool {
        matches!(self, Self::FuzzyDate | Self::FuzzyDesc)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "fuzzy_date" => Ok(Self::FuzzyDate),
            "fuzzy_desc" => Ok(Self::FuzzyDesc),
            "mismatch" => Ok(Self::Mismatch),
            other => Err(format!("Unknown match type '{}'", other)),
        }
    }
}

/// One reconciliation outcome as seen by the dashboard (REST activity and live feed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: String,
    pub match_type: MatchType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date: NaiveDate,
    pub bank_desc: String,
    pub ledger_desc: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub bank_items_scanned: usize,
    pub ledger_items_scanned: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    #[serde(default)]
    pub mismatches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_transactions: i64,
    pub total_matches: i64,
    pub reconciliation_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub status: String,
    pub results: RunResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusToggle {
    pub status: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordSetup {
    pub token: String,
    pub password: String,
}
