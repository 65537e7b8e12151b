//! Order placement and lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use common::{OrderId, ProductId};
use domain::PlaceOrder;
use serde::Deserialize;
use store::{Order, ShopStore};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, CurrentUser, idempotency_key};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// POST /orders
///
/// 201 with the new order, or 200 with the original order when the
/// `Idempotency-Key` was already used by this user.
pub async fn create<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let mut request = PlaceOrder::new(req.product_id, req.quantity);
    if let Some(key) = idempotency_key(&headers)? {
        request = request.with_idempotency_key(key);
    }

    let placement = state.orders.place_order(user.id, request).await?;
    let status = if placement.is_replay() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(placement.into_order())))
}

/// GET /orders
pub async fn list<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_orders(user.id).await?))
}

/// GET /orders/{id}
pub async fn get<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.get_order(user.id, id).await?))
}
