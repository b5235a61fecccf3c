// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Blocking console client for a running AutoRec service.

use crate::models::{
    BankStatement, InviteRequest, LedgerEntry, MatchEvent, PasswordSetup, Role, RunResponse,
    Stats, StatusMessage, StatusToggle, TokenResponse, User,
};
use crate::users::Invitation;
use crate::utils::http_client;
use reqwest::StatusCode;
use reqwest::blocking::{RequestBuilder, Response, multipart};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the stored credentials.
    #[error("not authenticated (log in again with `autorec remote login`)")]
    Unauthorized,

    #[error("server returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Base URL and bearer token persisted between console invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub base_url: String,
    pub token: String,
}

impl Session {
    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(crate::db::project_dirs()?.config_dir().join("session.json"))
    }

    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Returns whether a session file was removed.
    pub fn clear(path: &Path) -> anyhow::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct ApiClient {
    base: String,
    token: Option<String>,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            base: base_url.trim().trim_end_matches('/').to_string(),
            token: None,
            http: http_client()?,
        })
    }

    pub fn from_session(session: &Session) -> anyhow::Result<Self> {
        Ok(Self::new(&session.base_url)?.with_token(session.token.clone()))
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base, path)
    }

    fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(t) => rb.bearer_auth(t),
            None => rb,
        }
    }

    fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        let text = resp.text().unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.detail)
            .unwrap_or(text);
        Err(ClientError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    fn send<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T> {
        let resp = Self::check(self.authed(rb).send()?)?;
        Ok(resp.json()?)
    }

    /// Exchanges credentials for a token and keeps it on the client.
    pub fn login(&mut self, email: &str, password: &str, remember_me: bool) -> Result<String> {
        let remember = if remember_me { "true" } else { "false" };
        let resp = Self::check(
            self.http
                .post(self.url("/auth/token"))
                .form(&[
                    ("username", email),
                    ("password", password),
                    ("remember_me", remember),
                ])
                .send()?,
        )?;
        let body: TokenResponse = resp.json()?;
        self.token = Some(body.access_token.clone());
        Ok(body.access_token)
    }

    pub fn stats(&self) -> Result<Stats> {
        self.send(self.http.get(self.url("/reconcile/stats")))
    }

    pub fn activity(&self, limit: i64) -> Result<Vec<MatchEvent>> {
        self.send(
            self.http
                .get(self.url("/reconcile/activity"))
                .query(&[("limit", limit)]),
        )
    }

    pub fn run(&self) -> Result<RunResponse> {
        self.send(self.http.post(self.url("/reconcile/run")))
    }

    pub fn clear(&self) -> Result<StatusMessage> {
        self.send(self.http.delete(self.url("/reconcile/clear")))
    }

    pub fn reset_statements(&self) -> Result<()> {
        Self::check(
            self.authed(self.http.delete(self.url("/statements/reset")))
                .send()?,
        )?;
        Ok(())
    }

    pub fn list_statements(&self, skip: i64, limit: i64) -> Result<Vec<BankStatement>> {
        self.send(
            self.http
                .get(self.url("/statements/"))
                .query(&[("skip", skip), ("limit", limit)]),
        )
    }

    pub fn list_ledger(&self) -> Result<Vec<LedgerEntry>> {
        self.send(self.http.get(self.url("/ledger/")))
    }

    fn file_part(path: &Path) -> Result<multipart::Part> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = fs::read(path)?;
        Ok(multipart::Part::bytes(bytes).file_name(name))
    }

    pub fn upload_statement(&self, path: &Path, bank_name: &str) -> Result<BankStatement> {
        let form = multipart::Form::new()
            .text("bank_name", bank_name.to_string())
            .part("file", Self::file_part(path)?);
        self.send(self.http.post(self.url("/statements/upload")).multipart(form))
    }

    pub fn upload_ledger(&self, path: &Path) -> Result<Vec<LedgerEntry>> {
        let form = multipart::Form::new().part("file", Self::file_part(path)?);
        self.send(self.http.post(self.url("/ledger/upload")).multipart(form))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.send(self.http.get(self.url("/users/")))
    }

    pub fn invite_user(&self, email: &str, role: Role) -> Result<Invitation> {
        let body = InviteRequest {
            email: email.to_string(),
            role,
        };
        self.send(self.http.post(self.url("/users/invite")).json(&body))
    }

    pub fn toggle_user(&self, user_id: &str) -> Result<StatusToggle> {
        self.send(
            self.http
                .patch(self.url(&format!("/users/{}/status", user_id))),
        )
    }

    pub fn delete_user(&self, user_id: &str) -> Result<StatusMessage> {
        self.send(self.http.delete(self.url(&format!("/users/{}", user_id))))
    }

    pub fn setup_password(&self, token: &str, password: &str) -> Result<StatusMessage> {
        let body = PasswordSetup {
            token: token.to_string(),
            password: password.to_string(),
        };
        self.send(self.http.post(self.url("/users/setup-password")).json(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn session_save_load_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        assert!(Session::load(&path).unwrap().is_none());

        let s = Session {
            base_url: "http://localhost:8000".into(),
            token: "abc".into(),
        };
        s.save(&path).unwrap();
        assert_eq!(Session::load(&path).unwrap(), Some(s));
        assert!(Session::clear(&path).unwrap());
        assert!(!Session::clear(&path).unwrap());
    }

    #[test]
    fn base_url_is_normalized() {
        let c = ApiClient::new(" http://host:9000/ ").unwrap();
        assert_eq!(c.base_url(), "http://host:9000");
        assert_eq!(c.url("/reconcile/stats"), "http://host:9000/api/v1/reconcile/stats");
        assert!(c.token().is_none());
    }
}
