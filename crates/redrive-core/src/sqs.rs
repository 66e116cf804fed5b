//! SQS implementation of [`QueueTransport`] and the serializable message view.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs as sqs;
use sqs::types::{MessageSystemAttributeName, QueueAttributeName};

use crate::transport::{Message, QueueTransport, ReceiveOptions};

/// Transport backed by the AWS SDK SQS client.
///
/// # Example
///
/// ```no_run
/// use redrive::SqsTransport;
///
/// # async fn example() {
/// let config = aws_config::from_env().load().await;
/// let transport = SqsTransport::from_config(config);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SqsTransport {
    /// The AWS SDK configuration used for SQS operations
    pub config: SdkConfig,
    /// The SQS client instance
    pub client: sqs::Client,
}

impl SqsTransport {
    /// Creates a transport from a pre-built AWS SDK config.
    ///
    /// The caller decides credentials and endpoint, e.g. LocalStack for `--local`.
    pub fn from_config(config: SdkConfig) -> Self {
        let client = sqs::Client::new(&config);
        Self { config, client }
    }
}

fn seconds(duration: std::time::Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}

/// Converts an SDK message, rejecting messages without id, receipt handle or body.
///
/// # See Also
///
/// - [AWS SQS Message API Reference](https://docs.aws.amazon.com/AWSSimpleQueueService/latest/APIReference/API_Message.html)
fn from_aws_message(message: sqs::types::Message) -> anyhow::Result<Message> {
    let receive_count = message
        .attributes()
        .and_then(|attributes| attributes.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|count| count.parse().ok());

    Ok(Message {
        message_id: message.message_id.context("missing message_id")?,
        receipt_handle: message.receipt_handle.context("missing receipt_handle")?,
        body: message.body.context("missing body")?,
        receive_count,
    })
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn create_queue(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
    ) -> anyhow::Result<String> {
        let attributes = attributes
            .into_iter()
            .map(|(key, value)| (QueueAttributeName::from(key.as_str()), value))
            .collect();

        let output = self
            .client
            .create_queue()
            .queue_name(name)
            .set_attributes(Some(attributes))
            .send()
            .await
            .with_context(|| format!("failed to create queue {name}"))?;

        output
            .queue_url
            .with_context(|| format!("create queue {name} returned no url"))
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        names: &[&str],
    ) -> anyhow::Result<HashMap<String, String>> {
        let names = names.iter().map(|name| QueueAttributeName::from(*name)).collect();

        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .set_attribute_names(Some(names))
            .send()
            .await
            .context("failed to get queue attributes")?;

        Ok(output
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect())
    }

    async fn send_message(&self, queue_url: &str, body: &str) -> anyhow::Result<String> {
        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .context("failed to send message")?;

        output.message_id.context("send returned no message_id")
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> anyhow::Result<Option<Message>> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(options.max_messages)
            .visibility_timeout(seconds(options.visibility_timeout))
            .wait_time_seconds(seconds(options.wait_time))
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .context("failed to receive messages")?;

        // none means nothing arrived within the wait time
        match output.messages.and_then(|messages| messages.into_iter().next()) {
            Some(message) => from_aws_message(message).map(Some),
            None => Ok(None),
        }
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> anyhow::Result<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .context("failed to delete message")?;

        Ok(())
    }
}

/// Serializable representation of a received message.
///
/// Used for JSON output when inspecting a dead letter queue.
#[derive(Clone, Debug, serde::Serialize)]
pub struct MessageModel {
    /// Unique identifier for the message assigned by SQS
    pub message_id: String,
    /// Approximate number of times the message was delivered
    pub receive_count: Option<u32>,
    /// The message body, parsed when it is JSON
    pub body: serde_json::Value,
}

impl From<&Message> for MessageModel {
    fn from(message: &Message) -> Self {
        let body = serde_json::from_str(&message.body)
            .unwrap_or_else(|_| serde_json::Value::String(message.body.clone()));

        Self {
            message_id: message.message_id.clone(),
            receive_count: message.receive_count,
            body,
        }
    }
}
