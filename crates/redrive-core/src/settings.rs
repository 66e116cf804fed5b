//! Queue tunables and their defaults.

use std::time::Duration;

/// Suffix appended to a queue name to derive its dead letter queue name.
pub const DEAD_LETTER_QUEUE_SUFFIX: &str = "-deadMessages";

/// Receive count before a message is moved to the dead letter queue.
pub const MAX_RECEIVE_COUNT_BEFORE_DEAD: u32 = 5;

/// Retention period applied to both queues (14 days).
pub const MESSAGE_RETENTION_PERIOD: Duration = Duration::from_secs(1_209_600);

/// How long a received message stays hidden from other receivers.
pub const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(600);

/// Long-poll wait of a single receive call.
pub const WAIT_TIME: Duration = Duration::from_secs(20);

/// Region used when neither flags nor the environment name one.
pub const DEFAULT_REGION: &str = "eu-central-1";

/// Tunables for provisioning and polling a [`Queue`](crate::Queue).
///
/// `Default` yields the production values above.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueSettings {
    pub dead_letter_suffix: String,
    pub message_retention_period: Duration,
    /// Deliveries before the redrive policy moves a message; must be at least 1.
    pub max_receive_count: u32,
    pub visibility_timeout: Duration,
    pub wait_time: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            dead_letter_suffix: DEAD_LETTER_QUEUE_SUFFIX.to_string(),
            message_retention_period: MESSAGE_RETENTION_PERIOD,
            max_receive_count: MAX_RECEIVE_COUNT_BEFORE_DEAD,
            visibility_timeout: VISIBILITY_TIMEOUT,
            wait_time: WAIT_TIME,
        }
    }
}

impl QueueSettings {
    /// Name of the dead letter queue that belongs to `queue_name`.
    pub fn dead_letter_queue_name(&self, queue_name: &str) -> String {
        format!("{}{}", queue_name, self.dead_letter_suffix)
    }
}
