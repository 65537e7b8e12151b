//! Shopping carts.

use cache::{ReadThrough, keys};
use common::{ProductId, UserId};
use notify::{CartItemAddedData, Notifier, ShopEvent};
use store::{CartEntry, CartLine, CartStore, CatalogStore};

use crate::{Result, ShopError, validate};

/// Service for per-user carts.
///
/// Adding to a cart checks stock but reserves nothing. The authoritative
/// check happens when the order is placed, so a cart line can outlive the
/// stock it was checked against.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    cache: ReadThrough,
    notifier: Notifier,
}

impl<S: CartStore + CatalogStore> CartService<S> {
    pub fn new(store: S, cache: ReadThrough, notifier: Notifier) -> Self {
        Self {
            store,
            cache,
            notifier,
        }
    }

    /// Adds `quantity` of a product to the user's cart, merging with an
    /// existing line for the same product.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        validate::positive_quantity(quantity)?;

        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or_else(|| ShopError::not_found("product", product_id))?;

        if product.stock < quantity {
            return Err(ShopError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        let line = self.store.add_to_cart(user_id, product_id, quantity).await?;

        metrics::counter!("cart_additions_total").increment(1);
        tracing::debug!(line_quantity = line.quantity, "cart line updated");

        self.cache.invalidate(&keys::cart(user_id)).await;
        self.notifier
            .notify(ShopEvent::CartItemAdded(CartItemAddedData {
                user_id,
                product_id,
                quantity,
            }))
            .await;

        Ok(line)
    }

    /// Returns the user's cart lines with their products.
    #[tracing::instrument(skip(self))]
    pub async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartEntry>> {
        self.cache
            .get_or_compute_stock_view(&keys::cart(user_id), || async {
                self.store.list_cart(user_id).await.map_err(ShopError::from)
            })
            .await
    }
}
