// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Password hashing and signed bearer tokens.

use crate::error::{AppError, Result};
use crate::models::Role;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const HASH_SCHEME: &str = "sha256";
pub const DEFAULT_ITERATIONS: u32 = 100_000;

pub const SESSION_TTL_HOURS: i64 = 8;
pub const REMEMBER_TTL_DAYS: i64 = 30;

fn stretch(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt)
            .finalize()
            .into();
    }
    digest
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn hash_password(password: &str) -> String {
    hash_password_with(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_with(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = stretch(password, &salt, iterations.max(1));
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        iterations.max(1),
        hex::encode(salt),
        hex::encode(digest)
    )
}

/// Returns false for malformed hashes instead of erroring.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iters, salt, digest] = parts.as_slice() else {
        return false;
    };
    if *scheme != HASH_SCHEME {
        return false;
    }
    let (Ok(iters), Ok(salt), Ok(expected)) =
        (iters.parse::<u32>(), hex::decode(salt), hex::decode(digest))
    else {
        return false;
    };
    constant_time_eq(&stretch(password, &salt, iters.max(1)), &expected)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("hmac init: {e}")))
    }

    pub fn issue(&self, email: &str, role: Role, remember_me: bool) -> Result<String> {
        let ttl = if remember_me {
            Duration::days(REMEMBER_TTL_DAYS)
        } else {
            Duration::hours(SESSION_TTL_HOURS)
        };
        self.sign(&Claims {
            sub: email.to_string(),
            role,
            exp: (Utc::now() + ttl).timestamp(),
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| AppError::Internal(format!("encode claims: {e}")))?;
        let body = URL_SAFE_NO_PAD.encode(payload);
        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        Ok(format!("{}.{}", body, hex::encode(mac.finalize().into_bytes())))
    }

    /// Checks signature then expiry.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let (body, sig) = token.split_once('.').ok_or_else(AppError::credentials)?;
        let sig = hex::decode(sig).map_err(|_| AppError::credentials())?;
        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        mac.verify_slice(&sig).map_err(|_| AppError::credentials())?;

        let payload = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| AppError::credentials())?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AppError::credentials())?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(AppError::Unauthorized("Token has expired".to_string()));
        }
        Ok(claims)
    }
}

pub fn random_secret() -> String {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    hex::encode(key)
}
