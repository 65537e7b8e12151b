//! Domain event notifications.
//!
//! Events are published after the state change they describe has been
//! committed. Publishing is best-effort: `Notifier` logs and drops failures.

pub mod amqp;
pub mod error;
pub mod events;
pub mod memory;
pub mod notifier;
pub mod publisher;
pub mod topics;

pub use amqp::AmqpPublisher;
pub use error::{PublishError, Result};
pub use events::{
    CartItemAddedData, OrderPlacedData, ShopEvent, UserLoggedInData, UserRegisteredData,
};
pub use memory::{InMemoryPublisher, PublishedMessage};
pub use notifier::{DEFAULT_PUBLISH_TIMEOUT, Notifier};
pub use publisher::Publisher;
