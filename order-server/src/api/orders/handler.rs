//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::ServerState;
use crate::utils::validation::validate_create_order;
use crate::utils::{ApiResponse, AppError, AppResult};
use shared::order::{CreateOrderRequest, Order, OrderState, StateView};

fn parse_order_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::invalid_request(format!("invalid order id: {raw}")))
}

/// Create an order for the token's owner
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<ApiResponse<Order>> {
    validate_create_order(&payload)?;
    let order = state.orders.create_order(payload).await?;
    Ok(ApiResponse::success(order))
}

/// Get order by id or code
pub async fn get_order(
    State(state): State<ServerState>,
    Path(id_or_code): Path<String>,
) -> AppResult<ApiResponse<Order>> {
    let order = state.orders.get(&id_or_code)?;
    Ok(ApiResponse::success(order))
}

/// Latest state of an order
pub async fn check_state(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<StateView>> {
    let id = parse_order_id(&id)?;
    let view = state.orders.check_state(id)?;
    Ok(ApiResponse::success(view))
}

pub async fn confirm(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let id = parse_order_id(&id)?;
    state.orders.update_state(id, OrderState::Confirmed)?;
    Ok(ApiResponse::ok())
}

pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let id = parse_order_id(&id)?;
    state.orders.update_state(id, OrderState::Cancelled)?;
    Ok(ApiResponse::ok())
}
