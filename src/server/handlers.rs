// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{AppState, CurrentUser, Superuser};
use crate::error::{AppError, Result};
use crate::live::LiveFeed;
use crate::models::{
    BankStatement, InviteRequest, LedgerEntry, MatchEvent, PasswordSetup, RunResponse, Stats,
    StatusMessage, StatusToggle, TokenResponse, User,
};
use crate::users::Invitation;
use crate::{engine, ingest, parsers, reconcile, users};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Form, Json};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::result::Result as StdResult;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub(super) struct TokenForm {
    username: String,
    password: String,
    #[serde(default)]
    remember_me: Option<String>,
}

fn truthy(v: Option<&str>) -> bool {
    matches!(
        v.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "on" | "yes")
    )
}

pub(super) async fn login(
    State(state): State<AppState>,
    form: StdResult<Form<TokenForm>, FormRejection>,
) -> Result<Json<TokenResponse>> {
    let Form(form) = form?;
    let found = {
        let conn = state.db.lock().await;
        users::find_credentials(&conn, &form.username)?
    };
    let password = form.password;
    let user = tokio::task::spawn_blocking(move || users::check_password(found, &password))
        .await
        .map_err(|e| AppError::Internal(format!("password check failed: {e}")))??;
    let token = state
        .signer
        .issue(&user.email, user.role, truthy(form.remember_me.as_deref()))?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".into(),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct Page {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_page_limit")]
    limit: i64,
}

fn default_page_limit() -> i64 {
    100
}

pub(super) async fn list_statements(
    State(state): State<AppState>,
    _user: CurrentUser,
    page: StdResult<Query<Page>, QueryRejection>,
) -> Result<Json<Vec<BankStatement>>> {
    let Query(page) = page?;
    let conn = state.db.lock().await;
    Ok(Json(ingest::list_statements(&conn, page.skip, page.limit)?))
}

/// A file part plus the remaining text fields of an upload form.
struct Upload {
    filename: String,
    content: Vec<u8>,
    bank_name: Option<String>,
}

async fn read_upload(multipart: StdResult<Multipart, MultipartRejection>) -> Result<Upload> {
    let mut multipart = multipart?;
    let bad = |e: axum::extract::multipart::MultipartError| AppError::BadRequest(e.body_text());
    let mut file = None;
    let mut bank_name = None;
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(bad)?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("bank_name") => bank_name = Some(field.text().await.map_err(bad)?),
            _ => {}
        }
    }
    let (filename, content) =
        file.ok_or_else(|| AppError::BadRequest("Missing 'file' field".into()))?;
    Ok(Upload {
        filename,
        content,
        bank_name,
    })
}

pub(super) async fn upload_statement(
    State(state): State<AppState>,
    Superuser(user): Superuser,
    multipart: StdResult<Multipart, MultipartRejection>,
) -> Result<Json<BankStatement>> {
    let upload = read_upload(multipart).await?;
    let bank_name = upload
        .bank_name
        .ok_or_else(|| AppError::BadRequest("Missing 'bank_name' field".into()))?;
    let rows = parsers::normalize_file(&upload.filename, &upload.content, None)?;
    let mut conn = state.db.lock().await;
    let statement =
        ingest::save_statement(&mut conn, &upload.filename, &bank_name, Some(&user.id), &rows)?;
    Ok(Json(statement))
}

pub(super) async fn reset_statements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.lock().await;
    ingest::reset_statements(&mut conn)?;
    info!(by = %user.email, "statements reset");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_ledger(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<LedgerEntry>>> {
    let conn = state.db.lock().await;
    Ok(Json(ingest::list_ledger(&conn)?))
}

pub(super) async fn upload_ledger(
    State(state): State<AppState>,
    _admin: Superuser,
    multipart: StdResult<Multipart, MultipartRejection>,
) -> Result<Json<Vec<LedgerEntry>>> {
    let upload = read_upload(multipart).await?;
    let rows = parsers::normalize_file(&upload.filename, &upload.content, None)?;
    let mut conn = state.db.lock().await;
    Ok(Json(ingest::save_ledger(&mut conn, &rows)?))
}

pub(super) async fn run(
    State(state): State<AppState>,
    Superuser(user): Superuser,
) -> Result<Json<RunResponse>> {
    let outcome = {
        let mut conn = state.db.lock().await;
        engine::run(&mut conn, &state.config.matching)?
    };
    info!(by = %user.email, events = outcome.events.len(), "run requested");
    state
        .feed
        .publish_all(outcome.events, state.config.broadcast_delay)
        .await;
    Ok(Json(RunResponse {
        status: "success".into(),
        results: outcome.result,
    }))
}

pub(super) async fn stats(State(state): State<AppState>, _user: CurrentUser) -> Result<Json<Stats>> {
    let conn = state.db.lock().await;
    Ok(Json(reconcile::stats(&conn)?))
}

#[derive(Debug, Deserialize)]
pub(super) struct ActivityQuery {
    #[serde(default = "default_activity_limit")]
    limit: i64,
}

fn default_activity_limit() -> i64 {
    10
}

pub(super) async fn activity(
    State(state): State<AppState>,
    _user: CurrentUser,
    q: StdResult<Query<ActivityQuery>, QueryRejection>,
) -> Result<Json<Vec<MatchEvent>>> {
    let Query(q) = q?;
    let conn = state.db.lock().await;
    Ok(Json(reconcile::activity(&conn, q.limit)?))
}

pub(super) async fn clear(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<StatusMessage>> {
    let mut conn = state.db.lock().await;
    reconcile::clear(&mut conn)?;
    info!(by = %user.email, "data cleared");
    Ok(Json(StatusMessage::success("All data cleared")))
}

pub(super) async fn live_feed(
    State(state): State<AppState>,
    ws: StdResult<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response> {
    let feed = state.feed.clone();
    Ok(ws?.on_upgrade(move |socket| forward_events(socket, feed)))
}

async fn forward_events(socket: WebSocket, feed: LiveFeed) {
    let mut rx = feed.subscribe();
    let (mut sink, mut stream) = socket.split();
    debug!(subscribers = feed.subscriber_count(), "live feed client connected");
    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                // Text and ping frames only keep the connection alive.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            event = rx.recv() => match event {
                Ok(ev) => {
                    let text = match serde_json::to_string(&ev) {
                        Ok(t) => t,
                        Err(e) => {
                            warn!(error = %e, "could not encode match event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "live feed client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("live feed client disconnected");
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    _admin: Superuser,
) -> Result<Json<Vec<User>>> {
    let conn = state.db.lock().await;
    Ok(Json(users::list(&conn)?))
}

pub(super) async fn invite_user(
    State(state): State<AppState>,
    _admin: Superuser,
    req: StdResult<Json<InviteRequest>, JsonRejection>,
) -> Result<Json<Invitation>> {
    let Json(req) = req?;
    let conn = state.db.lock().await;
    let invitation = users::invite(
        &conn,
        &req.email,
        req.role,
        &state.config.frontend_url,
        state.notifier.as_ref(),
    )?;
    Ok(Json(invitation))
}

pub(super) async fn toggle_user(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    user_id: StdResult<Path<String>, PathRejection>,
) -> Result<Json<StatusToggle>> {
    let Path(user_id) = user_id?;
    let conn = state.db.lock().await;
    let is_active = users::toggle_status(&conn, &user_id, &admin)?;
    Ok(Json(StatusToggle {
        status: "updated".into(),
        is_active,
    }))
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    user_id: StdResult<Path<String>, PathRejection>,
) -> Result<Json<StatusMessage>> {
    let Path(user_id) = user_id?;
    let conn = state.db.lock().await;
    users::delete(&conn, &user_id, &admin)?;
    Ok(Json(StatusMessage::success("User deleted")))
}

pub(super) async fn setup_password(
    State(state): State<AppState>,
    payload: StdResult<Json<PasswordSetup>, JsonRejection>,
) -> Result<Json<StatusMessage>> {
    let Json(payload) = payload?;
    let conn = state.db.lock().await;
    users::setup_password(&conn, &payload.token, &payload.password)?;
    Ok(Json(StatusMessage::success("Password set successfully")))
}

#[cfg(test)]
mod tests {
    use super::truthy;

    #[test]
    fn remember_me_flags() {
        assert!(truthy(Some("true")));
        assert!(truthy(Some(" On ")));
        assert!(!truthy(Some("false")));
        assert!(!truthy(None));
    }
}
