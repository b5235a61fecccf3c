// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Service-level error type shared by storage, parsing, and the HTTP layer.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Missing, malformed, or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A file was recognised but could not be normalized.
    #[error("Normalization failed: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),

    /// A request that axum could not extract; keeps axum's status.
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::UnsupportedFormat(_) | Self::Parse(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Db(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Rejected { status, .. } => *status,
        }
    }

    pub fn credentials() -> Self {
        Self::Unauthorized("Could not validate credentials".to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

macro_rules! from_rejection {
    ($($rejection:ty),+ $(,)?) => {$(
        impl From<$rejection> for AppError {
            fn from(r: $rejection) -> Self {
                Self::Rejected {
                    status: r.status(),
                    detail: r.body_text(),
                }
            }
        }
    )+};
}

from_rejection!(
    FormRejection,
    JsonRejection,
    MultipartRejection,
    PathRejection,
    QueryRejection,
    WebSocketUpgradeRejection,
);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Storage and io failures are logged in full but only reported generically.
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let mut resp = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            resp.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::UnsupportedFormat("a.pdf".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::credentials().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthorized_response_carries_bearer_challenge() {
        let resp = AppError::credentials().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn rejections_keep_their_status() {
        let err = AppError::Rejected {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: "missing field `password`".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "missing field `password`");
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let resp = AppError::Internal("secret path /var/db".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
