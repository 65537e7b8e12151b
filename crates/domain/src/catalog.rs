//! Product catalog.

use cache::{ReadThrough, keys};
use common::{Money, ProductId};
use store::{CatalogStore, NewProduct, Product};

use crate::{Result, ShopError};

const MAX_NAME_LEN: usize = 200;

/// Input for creating a catalog entry.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub name: String,
    pub price: Money,
    pub description: Option<String>,
    pub stock: i32,
}

impl CreateProduct {
    fn validate(self) -> Result<NewProduct> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ShopError::Validation("name must not be empty".to_string()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ShopError::Validation(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        if !self.price.is_positive() {
            return Err(ShopError::Validation(
                "price must be greater than zero".to_string(),
            ));
        }
        if self.stock <= 0 {
            return Err(ShopError::Validation(
                "stock must be greater than zero".to_string(),
            ));
        }

        Ok(NewProduct {
            name,
            price: self.price,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            stock: self.stock,
        })
    }
}

/// Service for reading and creating products.
///
/// Admin checks happen before this service is called.
#[derive(Clone)]
pub struct CatalogService<S> {
    store: S,
    cache: ReadThrough,
}

impl<S: CatalogStore> CatalogService<S> {
    pub fn new(store: S, cache: ReadThrough) -> Self {
        Self { store, cache }
    }

    /// Lists every product by name.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.cache
            .get_or_compute_stock_view(keys::PRODUCTS_ALL, || async {
                self.store.list_products().await.map_err(ShopError::from)
            })
            .await
    }

    /// Returns one product.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.cache
            .get_or_compute_stock_view(&keys::product(id), || async {
                self.store
                    .find_product(id)
                    .await?
                    .ok_or_else(|| ShopError::not_found("product", id))
            })
            .await
    }

    /// Creates a product. Duplicate names are a `Conflict`.
    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(&self, request: CreateProduct) -> Result<Product> {
        let new_product = request.validate()?;
        let product = self.store.insert_product(new_product).await?;

        tracing::info!(product_id = %product.id, "product created");
        self.cache.invalidate(keys::PRODUCTS_ALL).await;

        Ok(product)
    }
}
