//! Shared identifiers and value types for the shop backend.

mod money;
mod types;

pub use money::Money;
pub use types::{OrderId, ProductId, UserId};
