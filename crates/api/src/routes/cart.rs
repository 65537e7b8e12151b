//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::ProductId;
use serde::Deserialize;
use store::{CartEntry, CartLine, ShopStore};

use crate::error::ApiError;
use crate::extract::{ApiJson, CurrentUser};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// POST /cart/add
pub async fn add<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<AddToCartRequest>,
) -> Result<Json<CartLine>, ApiError> {
    let line = state
        .cart
        .add_to_cart(user.id, req.product_id, req.quantity)
        .await?;
    Ok(Json(line))
}

/// GET /cart
pub async fn list<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CartEntry>>, ApiError> {
    Ok(Json(state.cart.list_cart(user.id).await?))
}
