//! Notification payloads.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::topics;

/// Events published after a state change has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ShopEvent {
    /// An order was placed and stock decremented.
    OrderPlaced(OrderPlacedData),

    /// A product was added to a cart.
    CartItemAdded(CartItemAddedData),

    /// A new account was created.
    UserRegistered(UserRegisteredData),

    /// A user logged in.
    UserLoggedIn(UserLoggedInData),
}

impl ShopEvent {
    /// Returns the topic this event belongs on.
    pub fn topic(&self) -> &'static str {
        match self {
            ShopEvent::OrderPlaced(_) => topics::ORDER_EVENTS,
            ShopEvent::CartItemAdded(_) => topics::CART_EVENTS,
            ShopEvent::UserRegistered(_) => topics::USER_EVENTS,
            ShopEvent::UserLoggedIn(_) => topics::LOGIN_EVENTS,
        }
    }

    /// Returns the serialized tag, e.g. `order_placed`.
    pub fn event_type(&self) -> &'static str {
        match self {
            ShopEvent::OrderPlaced(_) => "order_placed",
            ShopEvent::CartItemAdded(_) => "cart_item_added",
            ShopEvent::UserRegistered(_) => "user_registered",
            ShopEvent::UserLoggedIn(_) => "user_logged_in",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub placed_at: DateTime<Utc>,
}

/// Data for CartItemAdded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemAddedData {
    pub user_id: UserId,
    pub product_id: ProductId,

    /// Quantity added by this request, not the line total.
    pub quantity: i32,
}

/// Data for UserRegistered event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegisteredData {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
}

/// Data for UserLoggedIn event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLoggedInData {
    pub user_id: UserId,
    pub logged_in_at: DateTime<Utc>,
}
