//! Shop services.
//!
//! Each service owns a store handle, a read-through cache and a notifier.
//! State changes commit in the store first. Cache invalidation and
//! notifications follow and never undo a committed change.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod favorites;
pub mod orders;
pub mod validate;

pub use cart::CartService;
pub use catalog::{CatalogService, CreateProduct};
pub use error::{Result, ShopError};
pub use favorites::FavoritesService;
pub use orders::{OrderService, PlaceOrder};
