//! Cache key layout.

use common::{ProductId, UserId};

/// The full product listing.
pub const PRODUCTS_ALL: &str = "products:all";

/// A single product view.
pub fn product(id: ProductId) -> String {
    format!("product:{id}")
}

/// A user's cart view.
pub fn cart(user_id: UserId) -> String {
    format!("cart:{user_id}")
}

/// A user's order list.
pub fn orders(user_id: UserId) -> String {
    format!("orders:{user_id}")
}

/// A user's favorite products.
pub fn favorites(user_id: UserId) -> String {
    format!("favorites:{user_id}")
}
