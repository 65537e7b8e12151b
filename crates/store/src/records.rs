//! Row types persisted by the store.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StoreError;

/// A registered account. The password is only ever held as a hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

impl NewUser {
    /// Builds the stored row for this user.
    pub fn into_user(self) -> User {
        User {
            id: UserId::new(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_active: true,
            is_admin: self.is_admin,
            created_at: Utc::now(),
        }
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(rename = "price_cents")]
    pub price: Money,
    pub description: Option<String>,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub description: Option<String>,
    pub stock: i32,
}

impl NewProduct {
    /// Builds the stored row for this product.
    pub fn into_product(self) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            name: self.name,
            price: self.price,
            description: self.description,
            stock: self.stock,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One (user, product) line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

/// A cart line joined with the product it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub line: CartLine,
    pub product: Product,
}

/// Lifecycle status of an order. Only `Pending` is produced here; later
/// states are driven by fulfillment systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
}

impl OrderStatus {
    /// Returns the stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            other => Err(StoreError::Corrupt(format!("unknown order status '{other}'"))),
        }
    }
}

/// A reservation of stock for a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub status: OrderStatus,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to place an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    /// Builds the stored row for this order.
    pub fn into_order(self) -> Order {
        Order {
            id: OrderId::new(),
            user_id: self.user_id,
            product_id: self.product_id,
            quantity: self.quantity,
            status: OrderStatus::Pending,
            idempotency_key: self.idempotency_key,
            created_at: Utc::now(),
        }
    }

    /// Answers a repeated idempotency key with the order it first created.
    ///
    /// A key reused for a different product or quantity is a `Conflict`.
    pub fn replay(&self, existing: Order) -> Result<Placement, StoreError> {
        if existing.product_id != self.product_id || existing.quantity != self.quantity {
            return Err(StoreError::Conflict {
                entity: "order",
                field: "idempotency_key",
            });
        }
        Ok(Placement::Replayed(existing))
    }
}

/// Outcome of a placement: a freshly committed order, or the order an
/// earlier request with the same idempotency key already created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Created(Order),
    Replayed(Order),
}

impl Placement {
    /// Returns the order regardless of how it was obtained.
    pub fn order(&self) -> &Order {
        match self {
            Placement::Created(order) | Placement::Replayed(order) => order,
        }
    }

    /// Consumes the placement, returning the order.
    pub fn into_order(self) -> Order {
        match self {
            Placement::Created(order) | Placement::Replayed(order) => order,
        }
    }

    /// Returns true when no new order was written.
    pub fn is_replay(&self) -> bool {
        matches!(self, Placement::Replayed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_never_serialized() {
        let user = NewUser {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            is_admin: false,
        }
        .into_user();

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "alice");
        assert_eq!(json["is_active"], true);
    }

    #[test]
    fn order_status_round_trips_through_its_string_form() {
        let status: OrderStatus = "pending".parse().unwrap();
        assert_eq!(status, OrderStatus::Pending);
        assert_eq!(status.to_string(), "pending");
        assert!(matches!(
            "shipped".parse::<OrderStatus>(),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn new_order_starts_pending() {
        let order = NewOrder {
            user_id: UserId::new(),
            product_id: ProductId::new(),
            quantity: 2,
            idempotency_key: None,
        }
        .into_order();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn replay_requires_matching_product_and_quantity() {
        let request = NewOrder {
            user_id: UserId::new(),
            product_id: ProductId::new(),
            quantity: 2,
            idempotency_key: Some("checkout-7".into()),
        };
        let first = request.clone().into_order();

        let replayed = request.replay(first.clone()).unwrap();
        assert_eq!(replayed, Placement::Replayed(first.clone()));

        let bigger = NewOrder {
            quantity: 3,
            ..request.clone()
        };
        assert!(matches!(
            bigger.replay(first.clone()),
            Err(StoreError::Conflict {
                field: "idempotency_key",
                ..
            })
        ));

        let other_product = NewOrder {
            product_id: ProductId::new(),
            ..request
        };
        assert!(other_product.replay(first).is_err());
    }
}
