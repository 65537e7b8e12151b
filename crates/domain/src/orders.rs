//! Order placement.

use std::time::Instant;

use cache::{ReadThrough, keys};
use common::{OrderId, ProductId, UserId};
use notify::{Notifier, OrderPlacedData, ShopEvent};
use store::{NewOrder, Order, OrderStore, Placement};

use crate::{Result, ShopError, validate};

/// A request to reserve stock for one product.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub product_id: ProductId,
    pub quantity: i32,

    /// Client-supplied key that makes retries safe.
    pub idempotency_key: Option<String>,
}

impl PlaceOrder {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Service for placing and reading orders.
///
/// The stock check, decrement and order insert all happen inside the store
/// while the product row is locked. Cache invalidation and the notification
/// run afterwards and cannot undo a committed order.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    cache: ReadThrough,
    notifier: Notifier,
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: S, cache: ReadThrough, notifier: Notifier) -> Self {
        Self {
            store,
            cache,
            notifier,
        }
    }

    /// Places an order for `user_id`.
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive quantity or malformed key
    /// - `NotFound` if the product does not exist
    /// - `InsufficientStock` if the order would oversell
    /// - `StorageUnavailable` if the row lock times out or the store fails
    #[tracing::instrument(
        skip(self, request),
        fields(product_id = %request.product_id, quantity = request.quantity)
    )]
    pub async fn place_order(&self, user_id: UserId, request: PlaceOrder) -> Result<Placement> {
        validate::positive_quantity(request.quantity)?;
        if let Some(key) = &request.idempotency_key {
            validate::idempotency_key(key)?;
        }

        let start = Instant::now();
        let result = self
            .store
            .place_order(NewOrder {
                user_id,
                product_id: request.product_id,
                quantity: request.quantity,
                idempotency_key: request.idempotency_key,
            })
            .await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        let placement = match result {
            Ok(placement) => placement,
            Err(e) => {
                let err = ShopError::from(e);
                metrics::counter!("orders_rejected_total", "reason" => err.reason()).increment(1);
                match &err {
                    ShopError::StorageUnavailable(source) => {
                        tracing::error!(error = %source, "order placement failed")
                    }
                    other => tracing::info!(reason = other.reason(), "order rejected"),
                }
                return Err(err);
            }
        };

        let order = placement.order();
        if placement.is_replay() {
            tracing::info!(order_id = %order.id, "idempotent replay of existing order");
            return Ok(placement);
        }

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id, "order placed");

        self.cache
            .invalidate_all([
                keys::PRODUCTS_ALL.to_string(),
                keys::product(order.product_id),
                keys::orders(user_id),
            ])
            .await;

        self.notifier
            .notify(ShopEvent::OrderPlaced(OrderPlacedData {
                order_id: order.id,
                user_id,
                product_id: order.product_id,
                quantity: order.quantity,
                placed_at: order.created_at,
            }))
            .await;

        Ok(placement)
    }

    /// Returns one of the caller's orders. Other users' orders are reported
    /// as missing.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        match self.store.find_order(order_id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(ShopError::not_found("order", order_id)),
        }
    }

    /// Lists the caller's orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        self.cache
            .get_or_compute(&keys::orders(user_id), || async {
                self.store
                    .list_orders_for_user(user_id)
                    .await
                    .map_err(ShopError::from)
            })
            .await
    }
}
