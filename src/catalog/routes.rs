use axum::{Router, routing::get};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(handler::list_books).post(handler::create_book))
        .route("/books/top-rated", get(handler::top_rated_books))
        .route("/books/:id", get(handler::get_book))
        .route("/public/top-rated", get(handler::public_top_rated_books))
}
