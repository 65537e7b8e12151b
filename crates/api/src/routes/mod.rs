//! Route handlers, one module per resource.

pub mod auth;
pub mod cart;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod system;
pub mod users;
