// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! HTTP and WebSocket surface of the reconciliation service.

mod extract;
mod handlers;

pub use extract::{CurrentUser, Superuser};

use crate::auth::{self, TokenSigner};
use crate::config::Config;
use crate::db;
use crate::live::LiveFeed;
use crate::users::{InviteNotifier, LogNotifier};
use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub signer: Arc<TokenSigner>,
    pub config: Arc<Config>,
    pub feed: LiveFeed,
    pub notifier: Arc<dyn InviteNotifier>,
}

impl AppState {
    pub fn new(conn: Connection, config: Config) -> Self {
        let secret = match &config.secret_key {
            Some(k) => k.clone(),
            None => {
                warn!("AUTOREC_SECRET_KEY not set; using a random key, tokens will not survive a restart");
                auth::random_secret()
            }
        };
        Self {
            db: Arc::new(Mutex::new(conn)),
            signer: Arc::new(TokenSigner::new(secret)),
            feed: LiveFeed::new(config.feed_capacity),
            notifier: Arc::new(LogNotifier),
            config: Arc::new(config),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn InviteNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/token", post(handlers::login))
        .route("/statements/", get(handlers::list_statements))
        .route("/statements/upload", post(handlers::upload_statement))
        .route("/statements/reset", delete(handlers::reset_statements))
        .route("/ledger/", get(handlers::list_ledger))
        .route("/ledger/upload", post(handlers::upload_ledger))
        .route("/reconcile/run", post(handlers::run))
        .route("/reconcile/stats", get(handlers::stats))
        .route("/reconcile/activity", get(handlers::activity))
        .route("/reconcile/clear", delete(handlers::clear))
        .route("/reconcile/ws", get(handlers::live_feed))
        .route("/users/", get(handlers::list_users))
        .route("/users/invite", post(handlers::invite_user))
        .route("/users/setup-password", post(handlers::setup_password))
        .route("/users/:user_id/status", patch(handlers::toggle_user))
        .route("/users/:user_id", delete(handlers::delete_user));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api)
        .layer(from_fn_with_state(state.clone(), cors_middleware))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn allowed_origin(state: &AppState, req: &Request<Body>) -> Option<HeaderValue> {
    let origin = req.headers().get("origin")?.to_str().ok()?.trim();
    if state.config.cors_origins.iter().any(|o| o == origin) {
        HeaderValue::from_str(origin).ok()
    } else {
        None
    }
}

async fn cors_middleware(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let origin = allowed_origin(&state, &req);
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        if let Some(v) = origin {
            let h = resp.headers_mut();
            h.insert("access-control-allow-origin", v);
            h.insert(
                "access-control-allow-methods",
                HeaderValue::from_static("GET,POST,PATCH,DELETE,OPTIONS"),
            );
            h.insert(
                "access-control-allow-headers",
                HeaderValue::from_static("authorization,content-type"),
            );
            h.insert(
                "access-control-allow-credentials",
                HeaderValue::from_static("true"),
            );
        }
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(v) = origin {
        let h = resp.headers_mut();
        h.insert("access-control-allow-origin", v);
        h.insert(
            "access-control-allow-credentials",
            HeaderValue::from_static("true"),
        );
        h.insert("vary", HeaderValue::from_static("Origin"));
    }
    resp
}

/// Serves on an already bound listener until the task is cancelled.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "autorec listening");
    axum::serve(listener, build_router(state))
        .await
        .context("HTTP server failed")
}

pub async fn serve(config: Config) -> Result<()> {
    let path = config.resolved_db_path()?;
    let conn = db::open(&path)?;
    info!(db = %path.display(), "database ready");
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Bind {}", config.bind))?;
    serve_on(listener, AppState::new(conn, config)).await
}
