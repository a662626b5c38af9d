// handlers/categories.rs - /categories routes

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;

use crate::database::models::{Category, CategoryInput};
use crate::error::ApiError;
use crate::handlers::{parse_id, Message};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /categories
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let categories = state.stores.categories.list_categories().await?;
    Ok(ApiResponse::success(categories))
}

/// GET /categories/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Category> {
    let id = parse_id(&id)?;
    let category = state
        .stores
        .categories
        .find_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("The category with given id was not found"))?;
    Ok(ApiResponse::success(category))
}

/// POST /categories
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> ApiResult<Category> {
    user.require_admin()?;
    let Json(input) = payload?;

    if input.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        return Err(ApiError::field_error("name", "This field is required"));
    }

    let category = state.stores.categories.insert_category(input).await?;
    info!("Created category {} ({})", category.id, category.name);
    Ok(ApiResponse::created(category))
}

/// PUT /categories/:id - only the fields present in the body change
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> ApiResult<Category> {
    user.require_admin()?;
    let id = parse_id(&id)?;
    let Json(input) = payload?;

    let category = state
        .stores
        .categories
        .update_category(id, input)
        .await?
        .ok_or_else(|| ApiError::not_found("The category cannot be updated"))?;
    Ok(ApiResponse::success(category))
}

/// DELETE /categories/:id
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Message> {
    user.require_admin()?;
    let id = parse_id(&id)?;

    if !state.stores.categories.delete_category(id).await? {
        return Err(ApiError::not_found("The category was not found"));
    }
    info!("Deleted category {}", id);
    Ok(ApiResponse::success(Message::new("The category was deleted")))
}
