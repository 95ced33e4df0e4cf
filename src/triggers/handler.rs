use anyhow::Context;
use axum::{extract::State, http::StatusCode, response::Response};
use serde::{Deserialize, Serialize};

use super::{ADDED_DATE_TRIGGER, Triggers, parse_create_trigger};
use crate::api::{JsonBody, created, message, success};
use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::handler::AppState;
use crate::model::Trigger;

#[derive(Debug, Serialize)]
struct TriggersResponse {
    triggers: Vec<Trigger>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTriggerRequest {
    #[serde(rename = "triggerName")]
    pub trigger_name: Option<String>,
    #[serde(rename = "triggerSql")]
    pub trigger_sql: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DropTriggerRequest {
    #[serde(rename = "triggerName")]
    pub trigger_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct TriggerCreatedResponse {
    message: &'static str,
    #[serde(rename = "triggerName")]
    trigger_name: String,
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub async fn list_triggers(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Response> {
    let triggers = Triggers::new(&state.db)
        .list_triggers()
        .await
        .context("failed to fetch triggers")?;
    Ok(success(TriggersResponse { triggers }))
}

pub async fn create_trigger(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(payload): JsonBody<CreateTriggerRequest>,
) -> ApiResult<Response> {
    let (Some(trigger_name), Some(trigger_sql)) =
        (required(payload.trigger_name), required(payload.trigger_sql))
    else {
        return Err(ApiError::bad_request("Trigger name and SQL are required"));
    };

    let trigger = parse_create_trigger(&trigger_sql).map_err(ApiError::BadRequest)?;
    if !trigger.name.eq_ignore_ascii_case(&trigger_name) {
        return Err(ApiError::bad_request("Trigger name does not match the trigger SQL"));
    }

    Triggers::new(&state.db)
        .create_trigger(&trigger)
        .await
        .context("failed to create trigger")?;

    tracing::info!(admin = %admin.email, trigger = %trigger_name, "created trigger");
    Ok(created(TriggerCreatedResponse {
        message: "Trigger created successfully",
        trigger_name,
    }))
}

pub async fn drop_trigger(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(payload): JsonBody<DropTriggerRequest>,
) -> ApiResult<Response> {
    let Some(trigger_name) = required(payload.trigger_name) else {
        return Err(ApiError::bad_request("Trigger name is required"));
    };

    Triggers::new(&state.db)
        .drop_trigger(&trigger_name)
        .await
        .context("failed to delete trigger")?;

    tracing::info!(admin = %admin.email, trigger = %trigger_name, "dropped trigger");
    Ok(message(StatusCode::OK, "Trigger deleted successfully"))
}

pub async fn setup_triggers(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Response> {
    Triggers::new(&state.db)
        .install_added_date_trigger()
        .await
        .context("failed to set up triggers")?;

    tracing::info!(trigger = ADDED_DATE_TRIGGER, "installed trigger");
    Ok(message(StatusCode::CREATED, "Triggers set up successfully"))
}
