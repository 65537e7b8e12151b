use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, UserId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartEntry, CartLine, NewOrder, NewProduct, NewUser, Order, Placement, Product, Result,
    StoreError, User,
    store::{CartStore, CatalogStore, DEFAULT_LOCK_TIMEOUT, FavoriteStore, OrderStore, UserStore},
};

/// SQLSTATE for `lock_not_available`, raised when `lock_timeout` elapses.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE raised when integer arithmetic overflows the column type.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, is_admin, created_at";
const PRODUCT_COLUMNS: &str = "id, name, price_cents, description, stock, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, product_id, quantity, status, idempotency_key, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Sets how long `place_order` waits for a product row lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_active: row.try_get("is_active")?,
            is_admin: row.try_get("is_admin")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            description: row.try_get("description")?,
            stock: row.try_get("stock")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            status: status.parse()?,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_cart_line(row: &PgRow) -> Result<CartLine> {
        Ok(CartLine {
            id: row.try_get("line_id")?,
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            added_at: row.try_get("added_at")?,
        })
    }

    async fn order_by_key(&self, user_id: UserId, key: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND idempotency_key = $2"
        ))
        .bind(user_id.as_uuid())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Self::row_to_order).transpose()
    }

    /// Runs the lock, check, decrement and insert steps inside `tx`.
    ///
    /// Returning early drops `tx`, which rolls every step back.
    async fn place_order_in(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        order: NewOrder,
    ) -> Result<Order> {
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut **tx)
            .await
            .map_err(map_db_error)?;

        let stock: Option<i32> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(order.product_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await
                .map_err(map_db_error)?;

        let available = stock.ok_or_else(|| StoreError::not_found("product", order.product_id))?;
        if available < order.quantity {
            return Err(StoreError::InsufficientStock {
                product_id: order.product_id,
                requested: order.quantity,
                available,
            });
        }

        sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
            .bind(order.product_id.as_uuid())
            .bind(order.quantity)
            .execute(&mut **tx)
            .await
            .map_err(map_db_error)?;

        let user_id = order.user_id;
        let order = order.into_order();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, user_id, product_id, quantity, status, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.product_id.as_uuid())
        .bind(order.quantity)
        .bind(order.status.as_str())
        .bind(order.idempotency_key.as_deref())
        .bind(order.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e, "orders_user_id_fkey") {
                return StoreError::not_found("user", user_id);
            }
            map_db_error(e)
        })?;

        Self::row_to_order(row)
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let user = user.into_user();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, is_active, is_admin, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Self::row_to_user(row)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Self::row_to_user).transpose()
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<User> {
        let row = sqlx::query(&format!(
            "UPDATE users SET is_active = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(active)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        match row {
            Some(row) => Self::row_to_user(row),
            None => Err(StoreError::not_found("user", id)),
        }
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let product = product.into_product();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, price_cents, description, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.description.as_deref())
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Self::row_to_product(&row)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_lines (id, user_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity
            RETURNING id AS line_id, user_id, product_id, quantity, added_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e, "cart_lines_user_id_fkey") {
                return StoreError::not_found("user", user_id);
            }
            if is_foreign_key_violation(&e, "cart_lines_product_id_fkey") {
                return StoreError::not_found("product", product_id);
            }
            if has_sqlstate(&e, NUMERIC_VALUE_OUT_OF_RANGE) {
                return StoreError::CartQuantityOverflow { product_id };
            }
            map_db_error(e)
        })?;

        Self::row_to_cart_line(&row)
    }

    async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id AS line_id, c.user_id, c.product_id, c.quantity, c.added_at,
                   p.id, p.name, p.price_cents, p.description, p.stock, p.created_at, p.updated_at
            FROM cart_lines c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.added_at ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.iter()
            .map(|row| {
                Ok(CartEntry {
                    line: Self::row_to_cart_line(row)?,
                    product: Self::row_to_product(row)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(product_id = %order.product_id, quantity = order.quantity))]
    async fn place_order(&self, order: NewOrder) -> Result<Placement> {
        let request = order.clone();
        let user_id = order.user_id;
        let key = order.idempotency_key.clone();

        if let Some(key) = key.as_deref()
            && let Some(existing) = self.order_by_key(user_id, key).await?
        {
            return request.replay(existing);
        }

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        match self.place_order_in(&mut tx, order).await {
            Ok(created) => {
                tx.commit().await.map_err(map_db_error)?;
                Ok(Placement::Created(created))
            }
            // A concurrent request with the same key won the insert race.
            Err(StoreError::Conflict {
                entity: "order", ..
            }) => {
                drop(tx);
                let existing = match key.as_deref() {
                    Some(key) => self.order_by_key(user_id, key).await?,
                    None => None,
                };
                match existing {
                    Some(existing) => request.replay(existing),
                    None => Err(StoreError::Conflict {
                        entity: "order",
                        field: "idempotency_key",
                    }),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}

#[async_trait]
impl FavoriteStore for PostgresStore {
    async fn add_favorite(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_favorites (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, product_id) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e, "user_favorites_user_id_fkey") {
                return StoreError::not_found("user", user_id);
            }
            if is_foreign_key_violation(&e, "user_favorites_product_id_fkey") {
                return StoreError::not_found("product", product_id);
            }
            map_db_error(e)
        })?;

        Ok(())
    }

    async fn remove_favorite(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    async fn list_favorites(&self, user_id: UserId) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.price_cents, p.description, p.stock, p.created_at, p.updated_at
            FROM user_favorites f
            JOIN products p ON p.id = f.product_id
            WHERE f.user_id = $1
            ORDER BY p.name ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.iter().map(Self::row_to_product).collect()
    }
}

fn is_foreign_key_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.is_foreign_key_violation() && db_err.constraint() == Some(constraint)
    )
}

fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(code))
}

/// Maps driver errors onto the store's error taxonomy.
fn map_db_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => StoreError::LockTimeout,
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) => StoreError::Unavailable(err.to_string()),
        sqlx::Error::Database(db_err) => {
            if has_sqlstate(&err, LOCK_NOT_AVAILABLE) {
                return StoreError::LockTimeout;
            }
            if db_err.is_unique_violation() {
                let (entity, field) = match db_err.constraint() {
                    Some("users_username_key") => ("user", "username"),
                    Some("users_email_key") => ("user", "email"),
                    Some("products_name_key") => ("product", "name"),
                    Some("orders_user_idempotency_key") => ("order", "idempotency_key"),
                    Some("cart_lines_user_product_key") => ("cart line", "product"),
                    _ => return StoreError::Database(err),
                };
                return StoreError::Conflict { entity, field };
            }
            StoreError::Database(err)
        }
        _ => StoreError::Database(err),
    }
}
