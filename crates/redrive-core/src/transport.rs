//! The narrow interface a [`Queue`](crate::Queue) drives its hosted queue
//! service through.
//!
//! [`SqsTransport`](crate::SqsTransport) implements it on the AWS SDK; tests
//! substitute an in-memory double.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

/// Attribute key for the dead letter queue's resource identifier.
pub const QUEUE_ARN_ATTRIBUTE: &str = "QueueArn";

/// Attribute key for the retention period, in seconds.
pub const MESSAGE_RETENTION_PERIOD_ATTRIBUTE: &str = "MessageRetentionPeriod";

/// A message as handed out by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    /// Required to acknowledge (delete) the message.
    pub receipt_handle: String,
    pub body: String,
    /// Approximate number of deliveries so far, when the transport reports it.
    pub receive_count: Option<u32>,
}

/// Parameters of a single receive call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: i32,
    pub visibility_timeout: Duration,
    pub wait_time: Duration,
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Creates the queue if absent and returns its URL.
    async fn create_queue(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
    ) -> anyhow::Result<String>;

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        names: &[&str],
    ) -> anyhow::Result<HashMap<String, String>>;

    /// Returns the accepted message id.
    async fn send_message(&self, queue_url: &str, body: &str) -> anyhow::Result<String>;

    /// `Ok(None)` when the wait time elapses without a message.
    async fn receive_message(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> anyhow::Result<Option<Message>>;

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> anyhow::Result<()>;
}
