//! Error taxonomy for queue operations.
//!
//! Transport failures arrive as [`anyhow::Error`] values carrying the context
//! of the call that failed; they are wrapped here with the queue they concern.

use thiserror::Error;

/// Which provisioning step failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionStage {
    ValidateSettings,
    CreateDeadLetterQueue,
    DescribeDeadLetterQueue,
    EncodeRedrivePolicy,
    CreateQueue,
}

impl std::fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            ProvisionStage::ValidateSettings => "validating the settings",
            ProvisionStage::CreateDeadLetterQueue => "creating the dead letter queue",
            ProvisionStage::DescribeDeadLetterQueue => "describing the dead letter queue",
            ProvisionStage::EncodeRedrivePolicy => "encoding the redrive policy",
            ProvisionStage::CreateQueue => "creating the queue",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    /// Fatal to startup. Whatever was created before the failing stage remains.
    #[error("provisioning queue {queue} failed while {stage}")]
    Provision {
        queue: String,
        stage: ProvisionStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("queue {queue} has not been provisioned")]
    NotProvisioned { queue: String },

    #[error("failed to encode message body")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode body of message {message_id}")]
    Decode {
        message_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to send message to queue {queue}")]
    Send {
        queue: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to receive message from queue {queue}")]
    Receive {
        queue: String,
        #[source]
        source: anyhow::Error,
    },

    /// The message stays in flight and reappears after the visibility timeout.
    #[error("failed to delete message from queue {queue}")]
    Delete {
        queue: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to get attributes of queue {url}")]
    Attribute {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

impl QueueError {
    /// Transient errors are logged by the processor and the loop moves on.
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Provision { .. } | QueueError::NotProvisioned { .. } => false,
            QueueError::Encode(_) | QueueError::Decode { .. } => false,
            QueueError::Send { .. }
            | QueueError::Receive { .. }
            | QueueError::Delete { .. }
            | QueueError::Attribute { .. } => true,
        }
    }
}

/// Renders an error followed by its sources, `outer: inner: root`.
pub(crate) fn report(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
