//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{Money, ProductId};
use domain::CreateProduct;
use serde::Deserialize;
use store::{Product, ShopStore};

use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, ApiPath};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: i64,
    pub description: Option<String>,
    pub stock: i32,
}

/// GET /products
pub async fn list<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_products().await?))
}

/// GET /products/{id}
pub async fn get<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.get_product(id).await?))
}

/// POST /products (admin only)
pub async fn create<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(admin): AdminUser,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    tracing::debug!(admin_id = %admin.id, "admin creating product");

    let product = state
        .catalog
        .create_product(CreateProduct {
            name: req.name,
            price: Money::from_cents(req.price_cents),
            description: req.description,
            stock: req.stock,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}
