use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use serde::Serialize;

use super::{CreateShelf, CreateShelfItem, ShelfItemPatch, Shelves};
use crate::api::{JsonBody, created, from_json, message, success};
use crate::auth::AuthUser;
use crate::catalog::Catalog;
use crate::error::{ApiError, ApiResult};
use crate::handler::AppState;
use crate::model::{Shelf, ShelfItem, ShelfItemWithBook};

#[derive(Debug, Serialize)]
struct ShelvesResponse {
    shelves: Vec<Shelf>,
}

#[derive(Debug, Serialize)]
struct ShelfResponse {
    shelf: Shelf,
}

#[derive(Debug, Serialize)]
struct ItemsResponse {
    items: Vec<ShelfItemWithBook>,
}

#[derive(Debug, Serialize)]
struct ItemResponse {
    item: ShelfItem,
}

pub async fn list_shelves(State(state): State<AppState>, user: AuthUser) -> ApiResult<Response> {
    let shelves = Shelves::new(&state.db)
        .list_shelves(user.id)
        .await
        .context("failed to fetch shelves")?;
    Ok(success(ShelvesResponse { shelves }))
}

pub async fn create_shelf(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<CreateShelf>,
) -> ApiResult<Response> {
    let Some(name) = payload.shelf_name.filter(|n| !n.trim().is_empty()) else {
        return Err(ApiError::bad_request("Shelf name is required"));
    };
    let description = payload.description.unwrap_or_default();

    let shelf = Shelves::new(&state.db)
        .create_shelf(user.id, &name, &description)
        .await
        .context("failed to create shelf")?;

    tracing::info!(user_id = user.id, shelf_id = shelf.shelf_id, "created shelf");
    Ok(created(ShelfResponse { shelf }))
}

pub async fn get_shelf(State(state): State<AppState>, user: AuthUser, Path(id): Path<i64>) -> ApiResult<Response> {
    let shelf = Shelves::new(&state.db)
        .get_owned_shelf(id, user.id)
        .await
        .context("failed to fetch shelf")?
        .ok_or_else(|| ApiError::not_found("Shelf not found"))?;
    Ok(success(ShelfResponse { shelf }))
}

pub async fn delete_shelf(State(state): State<AppState>, user: AuthUser, Path(id): Path<i64>) -> ApiResult<Response> {
    let deleted = Shelves::new(&state.db)
        .delete_shelf(id, user.id)
        .await
        .context("failed to delete shelf")?;

    if !deleted {
        return Err(ApiError::not_found("Shelf not found"));
    }
    tracing::info!(user_id = user.id, shelf_id = id, "deleted shelf");
    Ok(message(StatusCode::OK, "Shelf deleted successfully"))
}

async fn require_shelf(shelves: &Shelves<'_>, shelf_id: i64, user_id: i64) -> ApiResult<Shelf> {
    shelves
        .get_owned_shelf(shelf_id, user_id)
        .await
        .context("failed to fetch shelf")?
        .ok_or_else(|| ApiError::not_found("Shelf not found"))
}

async fn require_item(shelves: &Shelves<'_>, item_id: i64, user_id: i64) -> ApiResult<ShelfItem> {
    shelves
        .find_owned_item(item_id, user_id)
        .await
        .context("failed to fetch shelf item")?
        .ok_or_else(|| ApiError::not_found("Item not found"))
}

pub async fn list_items(State(state): State<AppState>, user: AuthUser, Path(id): Path<i64>) -> ApiResult<Response> {
    let shelves = Shelves::new(&state.db);
    require_shelf(&shelves, id, user.id).await?;

    let items = shelves.list_items(id).await.context("failed to fetch shelf items")?;
    Ok(success(ItemsResponse { items }))
}

pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<CreateShelfItem>,
) -> ApiResult<Response> {
    let shelves = Shelves::new(&state.db);
    require_shelf(&shelves, id, user.id).await?;

    let new_item = payload.validate().map_err(ApiError::BadRequest)?;

    let exists = Catalog::new(&state.db)
        .book_exists(new_item.book_id)
        .await
        .context("failed to look up book")?;
    if !exists {
        return Err(ApiError::not_found("Book not found"));
    }

    let item = shelves
        .add_item(id, &new_item)
        .await
        .context("failed to add item to shelf")?;
    Ok(created(ItemResponse { item }))
}

/// The body is read as raw JSON so ownership is settled before its fields are.
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<serde_json::Value>,
) -> ApiResult<Response> {
    let shelves = Shelves::new(&state.db);
    require_item(&shelves, id, user.id).await?;

    let patch: ShelfItemPatch = from_json(body)?;
    let assignments = patch.assignments().map_err(ApiError::BadRequest)?;
    if assignments.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    shelves
        .update_item(id, assignments)
        .await
        .context("failed to update shelf item")?;
    Ok(message(StatusCode::OK, "Item updated successfully"))
}

pub async fn delete_item(State(state): State<AppState>, user: AuthUser, Path(id): Path<i64>) -> ApiResult<Response> {
    let shelves = Shelves::new(&state.db);
    require_item(&shelves, id, user.id).await?;

    shelves.delete_item(id).await.context("failed to delete shelf item")?;
    Ok(message(StatusCode::OK, "Item deleted successfully"))
}
