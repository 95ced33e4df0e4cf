use anyhow::Context;
use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::password::verify_password;
use super::session::SESSION_COOKIE;
use crate::api::{JsonBody, message};
use crate::error::{ApiError, ApiResult};
use crate::handler::AppState;
use crate::users::{Accounts, StoredUser};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: SessionUser,
}

fn session_cookie(token: &str, max_age: i64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
    .ok()
}

/// Checks a password against the stored credentials.
///
/// The stored `legacy_password` is only consulted when plaintext passwords are
/// enabled in configuration.
fn credentials_match(stored: &StoredUser, password: &str, allow_plaintext: bool) -> bool {
    if allow_plaintext && stored.legacy_password.as_deref() == Some(password) {
        tracing::warn!(user_id = stored.user.user_id, "logged in with a plaintext password");
        return true;
    }

    match &stored.password_hash {
        Some(hash) => verify_password(password, hash),
        None => false,
    }
}

pub async fn login(State(state): State<AppState>, JsonBody(payload): JsonBody<LoginRequest>) -> ApiResult<Response> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::Unauthorized);
    };
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    let stored = Accounts::new(&state.db)
        .find_by_email(&email)
        .await
        .context("failed to look up user")?
        .ok_or(ApiError::Unauthorized)?;

    let allow_plaintext = state.sessions.allow_plaintext_passwords();
    let (verified, stored) = tokio::task::spawn_blocking(move || {
        let ok = credentials_match(&stored, &password, allow_plaintext);
        (ok, stored)
    })
    .await
    .context("password verification task failed")?;

    if !verified {
        tracing::info!("invalid password for login attempt");
        return Err(ApiError::Unauthorized);
    }

    let user = stored.user;
    let token = state
        .sessions
        .issue(user.user_id, &user.email)
        .context("failed to issue session")?;

    let mut response = (
        StatusCode::OK,
        Json(LoginResponse {
            token: token.clone(),
            user: SessionUser {
                id: user.user_id.to_string(),
                email: user.email,
                name: user.user_name,
            },
        }),
    )
        .into_response();

    if let Some(cookie) = session_cookie(&token, state.sessions.ttl_seconds()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

pub async fn logout() -> Response {
    let mut response = message(StatusCode::OK, "Logged out");
    if let Some(cookie) = session_cookie("", 0) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::model::User;

    fn stored(hash: Option<String>, legacy: Option<&str>) -> StoredUser {
        StoredUser {
            user: User {
                user_id: 1,
                user_name: "ada".into(),
                email: "ada@example.com".into(),
                created_at: String::new(),
            },
            password_hash: hash,
            legacy_password: legacy.map(str::to_string),
        }
    }

    #[test]
    fn test_plaintext_fallback_needs_opt_in() {
        let user = stored(None, Some("hunter2"));
        assert!(!credentials_match(&user, "hunter2", false));
        assert!(credentials_match(&user, "hunter2", true));
        assert!(!credentials_match(&user, "wrong", true));
    }

    #[test]
    fn test_hashed_password() {
        let user = stored(Some(hash_password("hunter2").unwrap()), None);
        assert!(credentials_match(&user, "hunter2", false));
        assert!(!credentials_match(&user, "hunter3", false));
    }
}
