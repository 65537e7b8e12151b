//! Domain error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during shop operations.
#[derive(Debug, Error)]
pub enum ShopError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness rule was violated.
    #[error("{entity} with this {field} already exists")]
    Conflict {
        entity: &'static str,
        field: &'static str,
    },

    /// The product cannot cover the requested quantity.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// Input was rejected before reaching the store.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The store failed or a lock could not be taken in time. Safe to
    /// retry only if the caller never saw a definitive answer.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    /// An invariant was broken inside the system.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable reason, used in API error bodies and metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            ShopError::NotFound { .. } => "not_found",
            ShopError::Conflict { .. } => "conflict",
            ShopError::InsufficientStock { .. } => "insufficient_stock",
            ShopError::Validation(_) => "validation_failed",
            ShopError::StorageUnavailable(_) => "storage_unavailable",
            ShopError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for ShopError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => ShopError::NotFound { entity, id },
            StoreError::Conflict { entity, field } => ShopError::Conflict { entity, field },
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => ShopError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            overflow @ StoreError::CartQuantityOverflow { .. } => {
                ShopError::Validation(overflow.to_string())
            }
            StoreError::Corrupt(msg) => ShopError::Internal(msg),
            other => ShopError::StorageUnavailable(other),
        }
    }
}

/// Result type for shop operations.
pub type Result<T> = std::result::Result<T, ShopError>;
