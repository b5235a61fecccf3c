// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::AppState;
use crate::error::AppError;
use crate::models::User;
use crate::users;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

/// Any active user presenting a valid bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Like [`CurrentUser`] but rejects standard users with 403.
#[derive(Debug, Clone)]
pub struct Superuser(pub User);

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?;
        let conn = state.db.lock().await;
        let user = users::authenticate(&conn, &state.signer, token).inspect_err(|e| {
            debug!(error = %e, "bearer token rejected");
        })?;
        Ok(Self(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Superuser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_superuser() {
            return Err(AppError::Forbidden(
                "The user doesn't have enough privileges".into(),
            ));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(auth: Option<&str>) -> Parts {
        let mut b = Request::builder().uri("/");
        if let Some(a) = auth {
            b = b.header(AUTHORIZATION, a);
        }
        b.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer(&parts(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer(&parts(Some("bearer  xyz "))), Some("xyz"));
        assert_eq!(bearer(&parts(Some("Basic Zm9v"))), None);
        assert_eq!(bearer(&parts(Some("Bearer "))), None);
        assert_eq!(bearer(&parts(None)), None);
    }
}
