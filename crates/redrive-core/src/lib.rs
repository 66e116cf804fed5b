//! # redrive-core
//!
//! A durable work queue on AWS SQS with a dead letter queue attached.
//!
//! This crate provisions a queue together with its dead letter queue, publishes
//! JSON work items, and runs polling workers that decode, handle and
//! acknowledge them. Items that keep failing are moved to the dead letter queue
//! by the queue's redrive policy after a bounded number of deliveries.
//!
//! ## Features
//!
//! - **Provisioning**: dead letter queue first, then the queue with a redrive policy
//! - **Publishing**: serialize any `Serialize` payload and send it
//! - **Processing**: a cancellable poll → decode → handle → delete loop
//! - **Pluggable transport**: [`QueueTransport`] is injected, [`SqsTransport`] talks to SQS
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use redrive::{shutdown_channel, Processor, Queue, QueueSettings, SqsTransport};
//!
//! #[derive(serde::Deserialize)]
//! struct Resize {
//!     path: String,
//! }
//!
//! # async fn example() -> Result<(), redrive::QueueError> {
//! let config = aws_config::from_env().load().await;
//! let transport = Arc::new(SqsTransport::from_config(config));
//! let queue = Queue::open("thumbnails", transport, QueueSettings::default()).await?;
//!
//! let processor = Processor::from_fn(queue, |_queue, job: Resize| async move {
//!     println!("resizing {}", job.path);
//!     Ok::<(), anyhow::Error>(())
//! });
//!
//! let (_stop, token) = shutdown_channel();
//! processor.run(token).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod error;
mod processor;
mod queue;
mod redrive;
pub mod settings;
mod shutdown;
mod sqs;
mod transport;

#[cfg(test)]
mod test_utils;

pub use error::{ProvisionStage, QueueError};
pub use processor::{Iteration, MessageHandler, Processor};
pub use queue::Queue;
pub use redrive::{RedrivePolicy, REDRIVE_POLICY_ATTRIBUTE};
pub use settings::QueueSettings;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use sqs::{MessageModel, SqsTransport};
pub use transport::{
    Message, QueueTransport, ReceiveOptions, MESSAGE_RETENTION_PERIOD_ATTRIBUTE,
    QUEUE_ARN_ATTRIBUTE,
};
