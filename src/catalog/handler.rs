use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Serialize;

use super::{BookListParams, Catalog, CreateBook};
use crate::api::{JsonBody, created, success};
use crate::auth::{AdminUser, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::handler::AppState;
use crate::model::{Book, TopRatedBook};

#[derive(Debug, Serialize)]
struct BooksResponse {
    books: Vec<Book>,
}

#[derive(Debug, Serialize)]
struct BookResponse {
    book: Book,
}

#[derive(Debug, Serialize)]
struct TopRatedResponse {
    books: Vec<TopRatedBook>,
}

pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<BookListParams>,
) -> ApiResult<Response> {
    let page = params.into_page();
    let books = Catalog::new(&state.db)
        .list_books(&page)
        .await
        .context("failed to fetch books")?;

    tracing::debug!(count = books.len(), search = ?page.search, "listed books");
    Ok(success(BooksResponse { books }))
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Response> {
    let book = Catalog::new(&state.db)
        .get_book(id)
        .await
        .context("failed to fetch book")?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;
    Ok(success(BookResponse { book }))
}

pub async fn create_book(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(payload): JsonBody<CreateBook>,
) -> ApiResult<Response> {
    if payload.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Book title is required"));
    }
    if payload.pages.is_some_and(|p| p < 0) {
        return Err(ApiError::bad_request("Pages must not be negative"));
    }

    let book = Catalog::new(&state.db)
        .create_book(payload)
        .await
        .context("failed to create book")?;

    tracing::info!(book_id = book.book_id, "added book to catalog");
    Ok(created(BookResponse { book }))
}

async fn top_rated(state: &AppState) -> ApiResult<Response> {
    let books = Catalog::new(&state.db)
        .top_rated()
        .await
        .context("failed to fetch top rated books")?;
    Ok(success(TopRatedResponse { books }))
}

pub async fn top_rated_books(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Response> {
    top_rated(&state).await
}

pub async fn public_top_rated_books(State(state): State<AppState>) -> ApiResult<Response> {
    top_rated(&state).await
}
