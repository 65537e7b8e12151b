//! Favorite products.

use cache::{ReadThrough, keys};
use common::{ProductId, UserId};
use store::{FavoriteStore, Product};

use crate::{Result, ShopError};

/// Service for a user's favorite products.
#[derive(Clone)]
pub struct FavoritesService<S> {
    store: S,
    cache: ReadThrough,
}

impl<S: FavoriteStore> FavoritesService<S> {
    pub fn new(store: S, cache: ReadThrough) -> Self {
        Self { store, cache }
    }

    /// Marks a product as a favorite. Repeating it is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        self.store.add_favorite(user_id, product_id).await?;
        self.cache.invalidate(&keys::favorites(user_id)).await;
        Ok(())
    }

    /// Removes a favorite. Removing one that is not there succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        self.store.remove_favorite(user_id, product_id).await?;
        self.cache.invalidate(&keys::favorites(user_id)).await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Product>> {
        self.cache
            .get_or_compute_stock_view(&keys::favorites(user_id), || async {
                self.store
                    .list_favorites(user_id)
                    .await
                    .map_err(ShopError::from)
            })
            .await
    }
}
