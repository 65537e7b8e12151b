//! Favorite product endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::ProductId;
use store::{Product, ShopStore};

use crate::error::ApiError;
use crate::extract::{ApiPath, CurrentUser};
use crate::state::AppState;

/// POST /favorites/{product_id}
pub async fn add<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<StatusCode, ApiError> {
    state.favorites.add(user.id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /favorites/{product_id}
pub async fn remove<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<StatusCode, ApiError> {
    state.favorites.remove(user.id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /favorites
pub async fn list<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.favorites.list(user.id).await?))
}
