// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::auth::{TokenSigner, hash_password, verify_password};
use crate::error::{AppError, Result};
use crate::models::{Role, User};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Delivers invitation links. The service only depends on this seam; the
/// default implementation writes the link to the log.
pub trait InviteNotifier: Send + Sync {
    fn send_invite(&self, email: &str, link: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl InviteNotifier for LogNotifier {
    fn send_invite(&self, email: &str, link: &str) {
        info!(email, link, "user invited");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub status: String,
    pub email: String,
    pub setup_link: String,
}

const USER_COLS: &str = "id, email, role, is_active";

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = r.get(2)?;
    Ok(User {
        id: r.get(0)?,
        email: r.get(1)?,
        role: role.parse().unwrap_or(Role::Standard),
        is_active: r.get(3)?,
    })
}

fn normalize_email(email: &str) -> Result<String> {
    let e = email.trim().to_ascii_lowercase();
    if e.is_empty() || !e.contains('@') {
        return Err(AppError::BadRequest(format!("Invalid email '{}'", email.trim())));
    }
    Ok(e)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLS} FROM users WHERE email=?1");
    Ok(conn
        .query_row(&sql, params![email.trim().to_ascii_lowercase()], user_from_row)
        .optional()?)
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLS} FROM users WHERE id=?1");
    Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
}

pub fn list(conn: &Connection) -> Result<Vec<User>> {
    let sql = format!("SELECT {USER_COLS} FROM users ORDER BY created_at, email");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], user_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn create_superuser(conn: &Connection, email: &str, password: &str) -> Result<User> {
    let email = normalize_email(email)?;
    if password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".into()));
    }
    if find_by_email(conn, &email)?.is_some() {
        return Err(AppError::BadRequest(format!("User '{}' already exists", email)));
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        role: Role::Superuser,
        is_active: true,
    };
    conn.execute(
        "INSERT INTO users(id, email, password_hash, role, is_active) VALUES (?1,?2,?3,?4,1)",
        params![user.id, user.email, hash_password(password), user.role.as_str()],
    )?;
    info!(email = %user.email, "superuser created");
    Ok(user)
}

pub fn invite(
    conn: &Connection,
    email: &str,
    role: Role,
    frontend_url: &str,
    notifier: &dyn InviteNotifier,
) -> Result<Invitation> {
    let email = normalize_email(email)?;
    if find_by_email(conn, &email)?.is_some() {
        return Err(AppError::BadRequest("User already exists".into()));
    }
    let token = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users(id, email, password_hash, role, is_active, invite_token) VALUES (?1,?2,NULL,?3,1,?4)",
        params![Uuid::new_v4().to_string(), email, role.as_str(), token],
    )?;
    let link = format!(
        "{}/setup-password?token={}",
        frontend_url.trim_end_matches('/'),
        token
    );
    notifier.send_invite(&email, &link);
    Ok(Invitation {
        status: "invited".into(),
        email,
        setup_link: link,
    })
}

/// Flips `is_active`; returns the new value.
pub fn toggle_status(conn: &Connection, user_id: &str, actor: &User) -> Result<bool> {
    let user = find_by_id(conn, user_id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if user.id == actor.id {
        return Err(AppError::BadRequest("Cannot deactivate yourself".into()));
    }
    let active = !user.is_active;
    conn.execute(
        "UPDATE users SET is_active=?1 WHERE id=?2",
        params![active, user.id],
    )?;
    info!(email = %user.email, active, "user status changed");
    Ok(active)
}

pub fn delete(conn: &Connection, user_id: &str, actor: &User) -> Result<()> {
    let user = find_by_id(conn, user_id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if user.id == actor.id {
        return Err(AppError::BadRequest("Cannot delete yourself".into()));
    }
    let uploads: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bank_statements WHERE uploaded_by=?1",
        params![user.id],
        |r| r.get(0),
    )?;
    if uploads > 0 {
        return Err(AppError::BadRequest(
            "Cannot delete user. They may have linked data (uploads).".into(),
        ));
    }
    conn.execute("DELETE FROM users WHERE id=?1", params![user.id])?;
    info!(email = %user.email, "user deleted");
    Ok(())
}

pub fn setup_password(conn: &Connection, token: &str, password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".into()));
    }
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM users WHERE invite_token=?1",
            params![token.trim()],
            |r| r.get(0),
        )
        .optional()?;
    let id = id.ok_or_else(|| AppError::BadRequest("Invalid or expired token".into()))?;
    conn.execute(
        "UPDATE users SET password_hash=?1, invite_token=NULL WHERE id=?2",
        params![hash_password(password), id],
    )?;
    Ok(())
}

/// A user row together with its stored password hash.
#[derive(Debug, Clone)]
pub struct Credentials {
    user: User,
    password_hash: Option<String>,
}

pub fn find_credentials(conn: &Connection, email: &str) -> Result<Option<Credentials>> {
    Ok(conn
        .query_row(
            "SELECT id, email, role, is_active, password_hash FROM users WHERE email=?1",
            params![email.trim().to_ascii_lowercase()],
            |r| {
                Ok(Credentials {
                    user: user_from_row(r)?,
                    password_hash: r.get(4)?,
                })
            },
        )
        .optional()?)
}

/// Verifies a password against looked-up credentials. Runs the full hash
/// iteration count, so callers on an async runtime should move it off the
/// worker thread.
pub fn check_password(found: Option<Credentials>, password: &str) -> Result<User> {
    let bad = || AppError::Unauthorized("Incorrect email or password".into());
    let found = found.ok_or_else(bad)?;
    let hash = found.password_hash.as_deref().ok_or_else(bad)?;
    if !verify_password(password, hash) {
        return Err(bad());
    }
    if !found.user.is_active {
        return Err(AppError::Unauthorized("Account is disabled".into()));
    }
    Ok(found.user)
}

/// Checks credentials and returns a signed access token.
pub fn login(
    conn: &Connection,
    signer: &TokenSigner,
    email: &str,
    password: &str,
    remember_me: bool,
) -> Result<String> {
    let user = check_password(find_credentials(conn, email)?, password)?;
    signer.issue(&user.email, user.role, remember_me)
}

/// Resolves a bearer token to an active user.
pub fn authenticate(conn: &Connection, signer: &TokenSigner, token: &str) -> Result<User> {
    let claims = signer.verify(token)?;
    let user = find_by_email(conn, &claims.sub)?.ok_or_else(AppError::credentials)?;
    if !user.is_active {
        return Err(AppError::credentials());
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Vec<(String, String)>>);

    impl InviteNotifier for Captured {
        fn send_invite(&self, email: &str, link: &str) {
            self.0.lock().unwrap().push((email.into(), link.into()));
        }
    }

    #[test]
    fn invite_then_setup_then_login() {
        let conn = open_in_memory().unwrap();
        let admin = create_superuser(&conn, "Admin@Example.com", "pw").unwrap();
        assert_eq!(admin.email, "admin@example.com");

        let sink = Captured::default();
        let inv = invite(&conn, "ana@example.com", Role::Standard, "http://ui/", &sink).unwrap();
        assert!(inv.setup_link.starts_with("http://ui/setup-password?token="));
        assert_eq!(sink.0.lock().unwrap().len(), 1);

        let signer = TokenSigner::new("s");
        assert!(login(&conn, &signer, "ana@example.com", "", false).is_err());

        let token = inv.setup_link.split("token=").nth(1).unwrap();
        setup_password(&conn, token, "secret").unwrap();
        assert!(setup_password(&conn, token, "again").is_err());

        let t = login(&conn, &signer, "ANA@example.com", "secret", false).unwrap();
        let u = authenticate(&conn, &signer, &t).unwrap();
        assert_eq!(u.role, Role::Standard);
    }

    #[test]
    fn password_check_outcomes() {
        let conn = open_in_memory().unwrap();
        let admin = create_superuser(&conn, "a@x.io", "pw").unwrap();
        invite(&conn, "new@x.io", Role::Standard, "http://ui", &LogNotifier).unwrap();

        let ok = check_password(find_credentials(&conn, " A@X.io ").unwrap(), "pw").unwrap();
        assert_eq!(ok.id, admin.id);
        for (email, pw) in [("a@x.io", "nope"), ("ghost@x.io", "pw"), ("new@x.io", "")] {
            let err = check_password(find_credentials(&conn, email).unwrap(), pw).unwrap_err();
            assert_eq!(err.to_string(), "Incorrect email or password");
        }

        let other = create_superuser(&conn, "b@x.io", "pw").unwrap();
        toggle_status(&conn, &other.id, &admin).unwrap();
        let err = check_password(find_credentials(&conn, "b@x.io").unwrap(), "pw").unwrap_err();
        assert_eq!(err.to_string(), "Account is disabled");
    }

    #[test]
    fn duplicate_invite_is_rejected() {
        let conn = open_in_memory().unwrap();
        invite(&conn, "x@y.z", Role::Standard, "http://ui", &LogNotifier).unwrap();
        let err = invite(&conn, "x@y.z", Role::Superuser, "http://ui", &LogNotifier).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn cannot_toggle_or_delete_self() {
        let conn = open_in_memory().unwrap();
        let admin = create_superuser(&conn, "a@x.io", "pw").unwrap();
        assert!(toggle_status(&conn, &admin.id, &admin).is_err());
        assert!(delete(&conn, &admin.id, &admin).is_err());
        assert!(matches!(
            toggle_status(&conn, "missing", &admin),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn disabled_users_lose_access() {
        let conn = open_in_memory().unwrap();
        let signer = TokenSigner::new("s");
        let admin = create_superuser(&conn, "a@x.io", "pw").unwrap();
        let other = create_superuser(&conn, "b@x.io", "pw").unwrap();
        let t = login(&conn, &signer, "b@x.io", "pw", false).unwrap();

        assert!(!toggle_status(&conn, &other.id, &admin).unwrap());
        assert!(authenticate(&conn, &signer, &t).is_err());
        assert!(login(&conn, &signer, "b@x.io", "pw", false).is_err());
        assert!(toggle_status(&conn, &other.id, &admin).unwrap());
    }

    #[test]
    fn delete_blocked_by_uploads() {
        let conn = open_in_memory().unwrap();
        let admin = create_superuser(&conn, "a@x.io", "pw").unwrap();
        let other = create_superuser(&conn, "b@x.io", "pw").unwrap();
        conn.execute(
            "INSERT INTO bank_statements(id, filename, bank_name, format_type, uploaded_by) VALUES ('s','f','B','csv',?1)",
            params![other.id],
        )
        .unwrap();
        assert!(delete(&conn, &other.id, &admin).is_err());
        conn.execute("DELETE FROM bank_statements", []).unwrap();
        delete(&conn, &other.id, &admin).unwrap();
        assert_eq!(list(&conn).unwrap().len(), 1);
    }
}
