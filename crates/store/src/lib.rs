//! Relational persistence for the shop: users, catalog, carts, orders and
//! favorites.
//!
//! Every store trait has a PostgreSQL implementation and an in-memory one
//! with the same semantics, including the product row lock taken while an
//! order is placed.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    CartEntry, CartLine, NewOrder, NewProduct, NewUser, Order, OrderStatus, Placement, Product,
    User,
};
pub use store::{
    CartStore, CatalogStore, DEFAULT_LOCK_TIMEOUT, FavoriteStore, OrderStore, ShopStore,
    UserStore,
};
