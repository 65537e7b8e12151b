use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::{
    CartEntry, CartLine, NewOrder, NewProduct, NewUser, Order, Placement, Product, Result,
    StoreError, User,
    store::{CartStore, CatalogStore, DEFAULT_LOCK_TIMEOUT, FavoriteStore, OrderStore, UserStore},
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    products: HashMap<ProductId, Product>,
    cart: HashMap<(UserId, ProductId), CartLine>,
    orders: Vec<Order>,
    favorites: HashSet<(UserId, ProductId)>,
}

impl Tables {
    fn order_by_key(&self, user_id: UserId, key: &str) -> Option<&Order> {
        self.orders
            .iter()
            .find(|o| o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
    }
}

/// In-memory store implementation for testing.
///
/// Provides the same interface and guarantees as the PostgreSQL
/// implementation. Product row locks are emulated with one async mutex per
/// product, acquired under the configured lock timeout.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    row_locks: Arc<Mutex<HashMap<ProductId, Arc<Mutex<()>>>>>,
    lock_timeout: Duration,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            row_locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets how long `place_order` waits for a product row lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Makes every subsequent call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Holds the row lock of a product until the returned guard is dropped.
    pub async fn lock_product_row(&self, product_id: ProductId) -> OwnedMutexGuard<()> {
        self.row_lock(product_id).await.lock_owned().await
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of cart lines stored for a user.
    pub async fn cart_line_count(&self, user_id: UserId) -> usize {
        self.tables
            .read()
            .await
            .cart
            .keys()
            .filter(|(owner, _)| *owner == user_id)
            .count()
    }

    async fn row_lock(&self, product_id: ProductId) -> Arc<Mutex<()>> {
        self.row_locks
            .lock()
            .await
            .entry(product_id)
            .or_default()
            .clone()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict {
                entity: "user",
                field: "username",
            });
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict {
                entity: "user",
                field: "email",
            });
        }

        let user = user.into_user();
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.ensure_available()?;
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<User> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("user", id))?;
        user.is_active = active;
        Ok(user.clone())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;

        if tables.products.values().any(|p| p.name == product.name) {
            return Err(StoreError::Conflict {
                entity: "product",
                field: "name",
            });
        }

        let product = product.into_product();
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        self.ensure_available()?;
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        if !tables.products.contains_key(&product_id) {
            return Err(StoreError::not_found("product", product_id));
        }

        let line = match tables.cart.entry((user_id, product_id)) {
            Entry::Occupied(entry) => {
                let line = entry.into_mut();
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(StoreError::CartQuantityOverflow { product_id })?;
                line
            }
            Entry::Vacant(entry) => entry.insert(CartLine {
                id: Uuid::new_v4(),
                user_id,
                product_id,
                quantity,
                added_at: Utc::now(),
            }),
        };
        Ok(line.clone())
    }

    async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartEntry>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;

        let mut entries: Vec<_> = tables
            .cart
            .values()
            .filter(|line| line.user_id == user_id)
            .filter_map(|line| {
                tables.products.get(&line.product_id).map(|product| CartEntry {
                    line: line.clone(),
                    product: product.clone(),
                })
            })
            .collect();
        entries.sort_by_key(|e| e.line.added_at);
        Ok(entries)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn place_order(&self, order: NewOrder) -> Result<Placement> {
        self.ensure_available()?;

        if let Some(key) = order.idempotency_key.as_deref() {
            let tables = self.tables.read().await;
            if let Some(existing) = tables.order_by_key(order.user_id, key) {
                return order.replay(existing.clone());
            }
        }

        let row_lock = self.row_lock(order.product_id).await;
        let _guard = tokio::time::timeout(self.lock_timeout, row_lock.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)?;

        // Everything below happens in one critical section, so the decrement
        // and the insert are visible together or not at all.
        let mut tables = self.tables.write().await;

        if let Some(key) = order.idempotency_key.as_deref()
            && let Some(existing) = tables.order_by_key(order.user_id, key)
        {
            return order.replay(existing.clone());
        }

        let user_exists = tables.users.contains_key(&order.user_id);
        let product = tables
            .products
            .get_mut(&order.product_id)
            .ok_or_else(|| StoreError::not_found("product", order.product_id))?;

        if product.stock < order.quantity {
            return Err(StoreError::InsufficientStock {
                product_id: product.id,
                requested: order.quantity,
                available: product.stock,
            });
        }
        if !user_exists {
            return Err(StoreError::not_found("user", order.user_id));
        }

        product.stock -= order.quantity;
        product.updated_at = Utc::now();

        let order = order.into_order();
        tables.orders.push(order.clone());
        Ok(Placement::Created(order))
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FavoriteStore for InMemoryStore {
    async fn add_favorite(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        if !tables.products.contains_key(&product_id) {
            return Err(StoreError::not_found("product", product_id));
        }
        tables.favorites.insert((user_id, product_id));
        Ok(())
    }

    async fn remove_favorite(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        self.ensure_available()?;
        self.tables
            .write()
            .await
            .favorites
            .remove(&(user_id, product_id));
        Ok(())
    }

    async fn list_favorites(&self, user_id: UserId) -> Result<Vec<Product>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables
            .favorites
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .filter_map(|(_, product_id)| tables.products.get(product_id).cloned())
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }
}
