use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handler::register))
        .route(
            "/admin/users",
            get(handler::list_users).delete(handler::delete_user),
        )
}
