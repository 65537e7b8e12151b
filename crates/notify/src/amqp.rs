use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;

use crate::{Publisher, PublishError, Result, topics};

/// Delivery mode 2 asks the broker to write the message to disk.
const PERSISTENT: u8 = 2;

/// An open connection with its confirm-mode channel.
struct Link {
    connection: Connection,
    channel: Channel,
}

impl Link {
    async fn open(url: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        for topic in topics::ALL {
            channel
                .queue_declare(
                    topic,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        Ok(Self {
            connection,
            channel,
        })
    }

    fn is_usable(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

/// AMQP (RabbitMQ) publisher.
///
/// Each topic is a durable queue bound to the default exchange, so the
/// topic name doubles as the routing key. The channel runs in confirm mode
/// and `publish` waits for the broker's ack.
///
/// A closed connection or channel (broker restart, channel error) is
/// replaced on the next publish.
pub struct AmqpPublisher {
    url: String,
    link: Mutex<Option<Link>>,
}

impl AmqpPublisher {
    /// Connects to `url` and declares every topic queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker is unreachable or a declaration fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let link = Link::open(url).await?;
        tracing::info!(topics = ?topics::ALL, "AMQP publisher connected");

        Ok(Self {
            url: url.to_string(),
            link: Mutex::new(Some(link)),
        })
    }

    /// Closes the channel and the connection. A later `publish` opens a
    /// new connection.
    pub async fn close(&self) -> Result<()> {
        if let Some(link) = self.link.lock().await.take() {
            link.channel.close(200, "shutdown").await?;
            link.connection.close(200, "shutdown").await?;
        }
        Ok(())
    }

    /// Returns a usable channel, reconnecting if the current one is gone.
    async fn channel(&self) -> Result<Channel> {
        let mut link = self.link.lock().await;
        if let Some(current) = link.as_ref()
            && current.is_usable()
        {
            return Ok(current.channel.clone());
        }

        tracing::warn!("AMQP channel unavailable, reconnecting");
        let fresh = Link::open(&self.url).await?;
        metrics::counter!("amqp_reconnects_total").increment(1);
        let channel = fresh.channel.clone();
        *link = Some(fresh);
        Ok(channel)
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        if !topics::ALL.contains(&topic) {
            return Err(PublishError::UnknownTopic(topic.to_string()));
        }

        let confirmation = self
            .channel()
            .await?
            .basic_publish(
                "",
                topic,
                BasicPublishOptions::default(),
                payload.as_bytes(),
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(PERSISTENT),
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(PublishError::NotConfirmed {
                topic: topic.to_string(),
            });
        }

        Ok(())
    }
}
