use axum::{
    Router,
    routing::{get, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/shelves", get(handler::list_shelves).post(handler::create_shelf))
        .route("/shelves/:id", get(handler::get_shelf).delete(handler::delete_shelf))
        .route("/shelves/:id/items", get(handler::list_items).post(handler::add_item))
        .route("/shelf-items/:id", put(handler::update_item).delete(handler::delete_item))
        .route("/shelves/items/:id", put(handler::update_item).delete(handler::delete_item))
}
