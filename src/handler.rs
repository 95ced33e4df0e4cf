use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::info;

use crate::auth::Sessions;
use crate::db::Database;
use crate::error::ApiResult;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub sessions: Arc<Sessions>,
}

impl AppState {
    pub fn new(db: Database, sessions: Sessions) -> Self {
        Self {
            db: Arc::new(db),
            sessions: Arc::new(sessions),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// Answers ok once the database responds to a trivial query.
pub async fn healthcheck(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    info!("got healthcheck request");
    let mut rows = state.db.connection().query("SELECT 1", ()).await?;
    rows.next().await?;
    Ok(Json(HealthResponse { status: "ok" }))
}
