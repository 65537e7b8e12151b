use thiserror::Error;

/// Errors that can occur when publishing a notification.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The AMQP client reported an error.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// The broker refused the message.
    #[error("Message to '{topic}' was not confirmed by the broker")]
    NotConfirmed { topic: String },

    /// The topic is not one the publisher declared.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// The publisher cannot reach its broker.
    #[error("Publisher unavailable: {0}")]
    Unavailable(String),

    /// The event could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;
