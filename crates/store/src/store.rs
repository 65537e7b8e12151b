use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};

use crate::{CartEntry, CartLine, NewOrder, NewProduct, NewUser, Order, Placement, Product, Result, User};

/// Default budget for acquiring the product row lock during order placement.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistence for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user.
    ///
    /// Fails with `Conflict` if the username or email is already taken.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// Loads a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Loads a user by email address.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Loads a user by username.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Activates or deactivates an account.
    async fn set_user_active(&self, id: UserId, active: bool) -> Result<User>;
}

/// Persistence for the product catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a product.
    ///
    /// Fails with `Conflict` if the name is already taken.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Loads a product by id.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists all products ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>>;
}

/// Persistence for per-user carts.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Adds `quantity` of a product to a cart.
    ///
    /// An existing (user, product) line is incremented rather than duplicated.
    /// This does not reserve stock.
    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine>;

    /// Lists a user's cart lines together with their products.
    async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartEntry>>;
}

/// Persistence for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Places an order in a single transaction.
    ///
    /// Locks the product row, checks stock, decrements it and inserts the
    /// order. Either all of that commits or none of it does. Fails with
    /// `NotFound`, `InsufficientStock` or `LockTimeout`. If the request
    /// carries an idempotency key already used by the same user, the earlier
    /// order is returned as `Placement::Replayed` and stock is untouched.
    async fn place_order(&self, order: NewOrder) -> Result<Placement>;

    /// Loads an order by id.
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, oldest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;
}

/// Persistence for the user/product favorites association.
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Marks a product as a favorite. Adding twice is a no-op.
    async fn add_favorite(&self, user_id: UserId, product_id: ProductId) -> Result<()>;

    /// Removes a favorite. Removing a missing favorite is a no-op.
    async fn remove_favorite(&self, user_id: UserId, product_id: ProductId) -> Result<()>;

    /// Lists the user's favorite products ordered by name.
    async fn list_favorites(&self, user_id: UserId) -> Result<Vec<Product>>;
}

/// Everything the application needs from a backing store.
pub trait ShopStore:
    UserStore + CatalogStore + CartStore + OrderStore + FavoriteStore + Clone + 'static
{
}

impl<T> ShopStore for T where
    T: UserStore + CatalogStore + CartStore + OrderStore + FavoriteStore + Clone + 'static
{
}
