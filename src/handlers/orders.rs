// handlers/orders.rs - /orders routes, backed by the order service

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{Order, OrderDetail, OrderStatus, OrderSummary};
use crate::error::ApiError;
use crate::handlers::{parse_id, Message};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::CreateOrder;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<OrderStatus>,
}

/// GET /orders - newest first
pub async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<OrderSummary>> {
    user.require_admin()?;
    let orders = state.orders.list_orders().await?;
    Ok(ApiResponse::success(orders))
}

/// GET /orders/:id
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<OrderDetail> {
    let id = parse_id(&id)?;
    let order = state.orders.find_order(id).await?;
    user.require_self_or_admin(order.user)?;

    let detail = state.orders.get_order(id).await?;
    Ok(ApiResponse::success(detail))
}

/// POST /orders
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateOrder>, JsonRejection>,
) -> ApiResult<Order> {
    let Json(request) = payload?;
    if let Some(owner) = request.user {
        user.require_self_or_admin(owner)?;
    }

    let order = state.orders.create_order(request).await?;
    Ok(ApiResponse::created(order))
}

/// PUT /orders/:id - only the status can change
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Order> {
    user.require_admin()?;
    let id = parse_id(&id)?;
    let Json(update) = payload?;

    let status = update
        .status
        .filter(|s| !s.as_str().trim().is_empty())
        .ok_or_else(|| ApiError::field_error("status", "This field is required"))?;

    let order = state.orders.update_status(id, status).await?;
    Ok(ApiResponse::success(order))
}

/// DELETE /orders/:id - removes the order and its line items
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Message> {
    user.require_admin()?;
    let id = parse_id(&id)?;

    state.orders.delete_order(id).await?;
    Ok(ApiResponse::success(Message::new("The order was deleted")))
}

/// GET /orders/get/totalsales
pub async fn total_sales(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    user.require_admin()?;
    let total = state.orders.total_sales().await?;
    Ok(ApiResponse::success(json!({
        "totalSales": total.unwrap_or(Decimal::ZERO),
        "hasOrders": total.is_some(),
    })))
}

/// GET /orders/get/count
pub async fn count(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    user.require_admin()?;
    let order_count = state.orders.order_count().await?;
    Ok(ApiResponse::success(json!({ "orderCount": order_count })))
}

/// GET /orders/get/userorders/:userid
pub async fn user_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<OrderDetail>> {
    let user_id = parse_id(&user_id)?;
    user.require_self_or_admin(user_id)?;

    let orders = state.orders.user_orders(user_id).await?;
    Ok(ApiResponse::success(orders))
}
