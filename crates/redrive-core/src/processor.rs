//! The polling worker: receive, decode, handle, acknowledge.
//!
//! A message is deleted only after its handler succeeds. Decode and handler
//! failures leave it untouched; it becomes visible again when its visibility
//! timeout runs out and the queue's redrive policy moves it to the dead
//! letter queue after `max_receive_count` deliveries. Delivery is therefore
//! at-least-once and handlers must tolerate duplicates.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::codec;
use crate::error::{report, QueueError};
use crate::queue::Queue;
use crate::shutdown::ShutdownToken;
use crate::transport::Message;

/// Handles one decoded message body.
///
/// An `Err` leaves the message on the queue for redelivery. Implemented for
/// async closures taking `(Queue, T)`.
///
/// Handlers get the processor's [`Queue`] rather than the processor itself:
/// the queue is the only state a processor holds that a handler can use, for
/// example to publish follow-up work.
#[async_trait]
pub trait MessageHandler<T: Send + 'static>: Send + Sync {
    async fn handle(&self, queue: &Queue, body: T) -> anyhow::Result<()>;
}

#[async_trait]
impl<T, F, Fut> MessageHandler<T> for F
where
    T: Send + 'static,
    F: Fn(Queue, T) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, queue: &Queue, body: T) -> anyhow::Result<()> {
        (self)(queue.clone(), body).await
    }
}

/// What a single pass through the loop did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Iteration {
    /// The wait time elapsed without a message.
    Idle,
    ReceiveFailed,
    /// Left for redelivery.
    DecodeFailed,
    /// Left for redelivery.
    HandlerFailed,
    Acknowledged,
    /// Handled, but the delete failed; the message will be redelivered.
    AcknowledgeFailed,
}

/// Binds a [`Queue`] to a handler for bodies of type `T`.
///
/// Every delivery is decoded into a fresh `T`. Any number of processors,
/// including several over the same queue, can run side by side; the queue
/// service decides which receiver gets which message.
pub struct Processor<T, H> {
    queue: Queue,
    handler: H,
    _body: PhantomData<fn() -> T>,
}

impl<T, F, Fut> Processor<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(Queue, T) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    /// Builds a processor around an async closure.
    pub fn from_fn(queue: Queue, handler: F) -> Self {
        Self {
            queue,
            handler,
            _body: PhantomData,
        }
    }
}

impl<T, H> Processor<T, H>
where
    T: DeserializeOwned + Send + 'static,
    H: MessageHandler<T>,
{
    pub fn new(queue: Queue, handler: H) -> Self {
        Self {
            queue,
            handler,
            _body: PhantomData,
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Polls until `shutdown` fires.
    ///
    /// Shutdown is checked before every poll and interrupts a pending receive;
    /// a message already being handled is finished first. A failed receive is
    /// followed by a yield to the runtime and an immediate next poll; the
    /// receive wait time is the only throttle.
    ///
    /// Fails with [`QueueError::NotProvisioned`] without polling when the
    /// queue has no URL yet.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<(), QueueError> {
        let Some(queue_url) = self.queue.url() else {
            log::error!(queue_name:% = self.queue.name(); "Cannot process a queue that has not been provisioned");
            return Err(QueueError::NotProvisioned {
                queue: self.queue.name().to_string(),
            });
        };
        log::info!(queue_name:% = self.queue.name(), queue_url:% = queue_url; "Processing queue started");

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            log::debug!(queue_name:% = self.queue.name(), queue_url:% = queue_url; "Polling queue");
            let received = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                received = self.queue.receive_message() => received,
            };

            let iteration = self.dispatch(received).await;
            log::trace!(queue_name:% = self.queue.name(), iteration:? = iteration; "Iteration finished");

            // a transport can fail without ever suspending
            if iteration == Iteration::ReceiveFailed {
                tokio::task::yield_now().await;
            }
        }

        log::info!(queue_name:% = self.queue.name(), queue_url:% = queue_url; "Processing queue stopped");
        Ok(())
    }

    /// Runs the loop on a new tokio task.
    pub fn spawn(self, shutdown: ShutdownToken) -> JoinHandle<Result<(), QueueError>>
    where
        H: 'static,
    {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Performs exactly one receive and, if a message arrived, processes it.
    pub async fn poll_once(&self) -> Iteration {
        let received = self.queue.receive_message().await;
        self.dispatch(received).await
    }

    async fn dispatch(&self, received: Result<Option<Message>, QueueError>) -> Iteration {
        match received {
            Ok(Some(message)) => self.process(message).await,
            Ok(None) => Iteration::Idle,
            // logged by the queue
            Err(_) => Iteration::ReceiveFailed,
        }
    }

    async fn process(&self, message: Message) -> Iteration {
        let queue_name = self.queue.name();
        let queue_url = self.queue.url().unwrap_or_default();

        if let Some(count) = message.receive_count {
            if count >= self.queue.settings().max_receive_count {
                log::warn!(
                    queue_name:% = queue_name,
                    message_id:% = message.message_id,
                    receive_count = count;
                    "Last delivery before the message is moved to the dead letter queue"
                );
            }
        }

        let body: T = match codec::decode(&message) {
            Ok(body) => body,
            Err(err) => {
                log::warn!(
                    queue_name:% = queue_name,
                    queue_url:% = queue_url,
                    message_id:% = message.message_id,
                    receive_count:? = message.receive_count,
                    body:% = message.body,
                    error:% = report(&err);
                    "Error unmarshalling message"
                );
                return Iteration::DecodeFailed;
            }
        };

        if let Err(err) = self.handler.handle(&self.queue, body).await {
            log::warn!(
                queue_name:% = queue_name,
                queue_url:% = queue_url,
                message_id:% = message.message_id,
                receive_count:? = message.receive_count,
                error:% = format!("{err:#}");
                "Error processing message"
            );
            return Iteration::HandlerFailed;
        }

        match self.queue.delete_message(&message).await {
            Ok(()) => Iteration::Acknowledged,
            Err(err) => {
                log::warn!(
                    queue_name:% = queue_name,
                    queue_url:% = queue_url,
                    message_id:% = message.message_id,
                    error:% = report(&err);
                    "Error deleting queue message"
                );
                Iteration::AcknowledgeFailed
            }
        }
    }
}
