//! A work queue paired with its dead letter queue.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::codec;
use crate::error::{report, ProvisionStage, QueueError};
use crate::redrive::{RedrivePolicy, REDRIVE_POLICY_ATTRIBUTE};
use crate::settings::QueueSettings;
use crate::transport::{
    Message, QueueTransport, ReceiveOptions, MESSAGE_RETENTION_PERIOD_ATTRIBUTE,
    QUEUE_ARN_ATTRIBUTE,
};

/// Messages read from the dead letter queue for inspection stay hidden this long.
const DEAD_LETTER_PEEK_VISIBILITY: Duration = Duration::from_secs(30);

const DEAD_LETTER_PEEK_WAIT: Duration = Duration::from_secs(1);

/// A named queue and the dead letter queue its failed messages are moved to.
///
/// URLs are set by [`Queue::provision`] (or [`Queue::attach`]) and read-only
/// afterwards, so clones can be shared freely between processors and senders.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use redrive::{Queue, QueueSettings, SqsTransport};
///
/// # async fn example() -> Result<(), redrive::QueueError> {
/// let config = aws_config::from_env().load().await;
/// let transport = Arc::new(SqsTransport::from_config(config));
///
/// let queue = Queue::open("thumbnails", transport, QueueSettings::default()).await?;
/// queue.send_message(&serde_json::json!({ "path": "/img/cat.png" })).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Queue {
    name: String,
    url: Option<String>,
    dead_letter_url: Option<String>,
    settings: QueueSettings,
    transport: Arc<dyn QueueTransport>,
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("dead_letter_url", &self.dead_letter_url)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Queue {
    /// An unprovisioned queue; call [`Queue::provision`] before using it.
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn QueueTransport>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            name: name.into(),
            url: None,
            dead_letter_url: None,
            settings,
            transport,
        }
    }

    /// Builds and provisions the queue in one step.
    pub async fn open(
        name: impl Into<String>,
        transport: Arc<dyn QueueTransport>,
        settings: QueueSettings,
    ) -> Result<Self, QueueError> {
        let mut queue = Self::new(name, transport, settings);
        queue.provision().await?;
        Ok(queue)
    }

    /// Binds to queues that were provisioned elsewhere.
    pub fn attach(
        name: impl Into<String>,
        url: impl Into<String>,
        dead_letter_url: impl Into<String>,
        transport: Arc<dyn QueueTransport>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            dead_letter_url: Some(dead_letter_url.into()),
            settings,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` until provisioning succeeds.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// `None` until the dead letter queue has been created.
    pub fn dead_letter_url(&self) -> Option<&str> {
        self.dead_letter_url.as_deref()
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Creates the dead letter queue, then the queue itself with a redrive
    /// policy pointing at it.
    ///
    /// Settings are checked before anything is created, and the queue is never
    /// created without its dead letter queue. Nothing is rolled back on
    /// failure; creation is idempotent on the service side, so calling this
    /// again after a failure is safe.
    pub async fn provision(&mut self) -> Result<(), QueueError> {
        if self.settings.max_receive_count == 0 {
            return Err(self.provision_failed(
                ProvisionStage::ValidateSettings,
                anyhow::anyhow!("max_receive_count must be at least 1"),
            ));
        }

        let retention = self.settings.message_retention_period.as_secs().to_string();

        let dead_letter_name = self.settings.dead_letter_queue_name(&self.name);
        let attributes = HashMap::from([(
            MESSAGE_RETENTION_PERIOD_ATTRIBUTE.to_string(),
            retention.clone(),
        )]);
        let dead_letter_url = self
            .transport
            .create_queue(&dead_letter_name, attributes)
            .await
            .map_err(|source| self.provision_failed(ProvisionStage::CreateDeadLetterQueue, source))?;

        log::info!(queue_name:% = dead_letter_name, queue_url:% = dead_letter_url; "Dead letter queue initialized");
        self.dead_letter_url = Some(dead_letter_url.clone());

        let mut dead_letter_attributes = self
            .describe_attributes(&dead_letter_url, &[QUEUE_ARN_ATTRIBUTE])
            .await
            .map_err(|err| {
                self.provision_failed(ProvisionStage::DescribeDeadLetterQueue, err.into())
            })?;
        let dead_letter_arn = dead_letter_attributes
            .remove(QUEUE_ARN_ATTRIBUTE)
            .ok_or_else(|| {
                self.provision_failed(
                    ProvisionStage::DescribeDeadLetterQueue,
                    anyhow::anyhow!("attribute {QUEUE_ARN_ATTRIBUTE} missing from response"),
                )
            })?;

        let policy = RedrivePolicy::new(dead_letter_arn)
            .with_max_receive_count(self.settings.max_receive_count);
        let policy = policy
            .to_attribute()
            .map_err(|err| self.provision_failed(ProvisionStage::EncodeRedrivePolicy, err.into()))?;

        let attributes = HashMap::from([
            (REDRIVE_POLICY_ATTRIBUTE.to_string(), policy),
            (MESSAGE_RETENTION_PERIOD_ATTRIBUTE.to_string(), retention),
        ]);
        let url = self
            .transport
            .create_queue(&self.name, attributes)
            .await
            .map_err(|source| self.provision_failed(ProvisionStage::CreateQueue, source))?;

        log::info!(queue_name:% = self.name, queue_url:% = url; "Queue initialized");
        self.url = Some(url);

        Ok(())
    }

    fn provision_failed(&self, stage: ProvisionStage, source: anyhow::Error) -> QueueError {
        let err = QueueError::Provision {
            queue: self.name.clone(),
            stage,
            source,
        };
        log::error!(queue_name:% = self.name, error:% = report(&err); "Provisioning queue failed");
        err
    }

    fn require_url(&self) -> Result<&str, QueueError> {
        self.url.as_deref().ok_or_else(|| QueueError::NotProvisioned {
            queue: self.name.clone(),
        })
    }

    /// Serializes `payload` as JSON and sends it, returning the message id.
    pub async fn send_message<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<String, QueueError> {
        let url = self.require_url()?;

        let body = codec::encode(payload).inspect_err(|err| {
            log::error!(queue_name:% = self.name, error:% = report(err); "Marshal the message body for the queue");
        })?;

        let message_id = self
            .transport
            .send_message(url, &body)
            .await
            .map_err(|source| QueueError::Send {
                queue: self.name.clone(),
                source,
            })
            .inspect_err(|err| {
                log::error!(queue_name:% = self.name, error:% = report(err); "Sending message to queue");
            })?;

        log::info!(queue_name:% = self.name, message_id:% = message_id; "Message sent to the queue");
        Ok(message_id)
    }

    /// Long-polls for a single message.
    ///
    /// `Ok(None)` means the wait time elapsed with nothing to do.
    pub async fn receive_message(&self) -> Result<Option<Message>, QueueError> {
        let url = self.require_url()?;
        let options = ReceiveOptions {
            max_messages: 1,
            visibility_timeout: self.settings.visibility_timeout,
            wait_time: self.settings.wait_time,
        };

        self.transport
            .receive_message(url, options)
            .await
            .map_err(|source| QueueError::Receive {
                queue: self.name.clone(),
                source,
            })
            .inspect_err(|err| {
                log::error!(queue_name:% = self.name, error:% = report(err); "Receiving message from queue");
            })
    }

    /// Reads one message from the dead letter queue without removing it.
    ///
    /// The message becomes visible on the dead letter queue again shortly after.
    pub async fn receive_dead_letter(&self) -> Result<Option<Message>, QueueError> {
        let url = self
            .dead_letter_url
            .as_deref()
            .ok_or_else(|| QueueError::NotProvisioned {
                queue: self.settings.dead_letter_queue_name(&self.name),
            })?;
        let options = ReceiveOptions {
            max_messages: 1,
            visibility_timeout: DEAD_LETTER_PEEK_VISIBILITY,
            wait_time: DEAD_LETTER_PEEK_WAIT,
        };

        self.transport
            .receive_message(url, options)
            .await
            .map_err(|source| QueueError::Receive {
                queue: self.settings.dead_letter_queue_name(&self.name),
                source,
            })
            .inspect_err(|err| {
                log::error!(
                    queue_name:% = self.name,
                    queue_url:% = url,
                    error:% = report(err);
                    "Receiving message from dead letter queue"
                );
            })
    }

    /// Acknowledges `message`, removing it from the queue for good.
    pub async fn delete_message(&self, message: &Message) -> Result<(), QueueError> {
        match self.delete_by_receipt_handle(&message.receipt_handle).await {
            Ok(()) => {
                log::info!(queue_name:% = self.name, message_id:% = message.message_id; "Message deleted from queue");
                Ok(())
            }
            Err(err) => {
                log::error!(
                    queue_name:% = self.name,
                    message_id:% = message.message_id,
                    error:% = report(&err);
                    "Deleting message from queue"
                );
                Err(err)
            }
        }
    }

    /// A failed delete leaves the message in flight; it is redelivered after
    /// the visibility timeout.
    pub async fn delete_by_receipt_handle(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let url = self.require_url()?;
        self.transport
            .delete_message(url, receipt_handle)
            .await
            .map_err(|source| QueueError::Delete {
                queue: self.name.clone(),
                source,
            })
    }

    /// Fetches the named attributes of any queue.
    pub async fn describe_attributes(
        &self,
        url: &str,
        names: &[&str],
    ) -> Result<HashMap<String, String>, QueueError> {
        self.transport
            .get_queue_attributes(url, names)
            .await
            .map_err(|source| QueueError::Attribute {
                url: url.to_string(),
                source,
            })
            .inspect_err(|err| {
                log::error!(
                    queue_name:% = self.name,
                    queue_url:% = url,
                    error:% = report(err);
                    "Getting queue attributes"
                );
            })
    }
}
