use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/triggers",
            get(handler::list_triggers)
                .post(handler::create_trigger)
                .delete(handler::drop_trigger),
        )
        .route("/admin/triggers/setup", post(handler::setup_triggers))
}
