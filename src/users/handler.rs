use anyhow::Context;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::{Accounts, RegisterUser};
use crate::api::{JsonBody, created, success};
use crate::auth::{AdminUser, hash_password};
use crate::error::{ApiError, ApiResult};
use crate::handler::AppState;
use crate::model::{User, UserSummary};

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    message: &'static str,
    user: RegisteredUser,
}

#[derive(Debug, Serialize)]
struct UsersResponse {
    users: Vec<UserSummary>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    format!("{:#}", e).contains("UNIQUE constraint failed")
}

fn email_taken() -> ApiError {
    ApiError::Conflict("User with this email already exists".to_string())
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterUser>,
) -> ApiResult<Response> {
    let (Some(user_name), Some(email), Some(password)) = (
        required(payload.user_name),
        required(payload.email),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Username, email, and password are required"));
    };

    // the admin account is seeded from configuration, never self-registered
    if state.sessions.is_admin(&email) {
        tracing::warn!("registration attempted with the admin email");
        return Err(ApiError::Conflict("This email address is reserved".to_string()));
    }

    let accounts = Accounts::new(&state.db);

    if accounts
        .email_exists(&email)
        .await
        .context("failed to check existing user")?
    {
        return Err(email_taken());
    }

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")??;

    match accounts.create_user(&user_name, &email, &password_hash).await {
        Ok(User { user_id, user_name, email, .. }) => {
            tracing::info!(user_id, "registered user");
            Ok(created(RegisterResponse {
                message: "User created successfully",
                user: RegisteredUser {
                    user_id,
                    user_name,
                    email,
                },
            }))
        }
        Err(e) if is_unique_violation(&e) => Err(email_taken()),
        Err(e) => Err(e.context("failed to register user").into()),
    }
}

pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Response> {
    let users = Accounts::new(&state.db)
        .list_users(state.sessions.admin_email())
        .await
        .context("failed to list users")?;
    Ok(success(UsersResponse { users }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(payload): JsonBody<DeleteUserRequest>,
) -> ApiResult<Response> {
    let Some(user_id) = payload.user_id else {
        return Err(ApiError::bad_request("userId is required"));
    };

    if user_id == admin.id {
        return Err(ApiError::bad_request("The admin account cannot delete itself"));
    }

    let deleted = Accounts::new(&state.db)
        .delete_user(user_id)
        .await
        .context("failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }
    tracing::info!(user_id, "deleted user and their shelves");
    Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
}
