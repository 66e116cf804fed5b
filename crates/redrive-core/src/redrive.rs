//! The redrive policy attached to a primary queue.

use serde::{Deserialize, Serialize};

use crate::settings::MAX_RECEIVE_COUNT_BEFORE_DEAD;

/// Queue attribute key carrying the serialized [`RedrivePolicy`].
pub const REDRIVE_POLICY_ATTRIBUTE: &str = "RedrivePolicy";

/// Dead letter relationship of a queue.
///
/// Serialized as `{"maxReceiveCount":5,"deadLetterTargetArn":"arn:..."}`; the
/// field names are fixed by the SQS attribute contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    pub max_receive_count: u32,
    pub dead_letter_target_arn: String,
}

impl RedrivePolicy {
    /// Policy with the default receive count.
    pub fn new(dead_letter_target_arn: impl Into<String>) -> Self {
        Self {
            max_receive_count: MAX_RECEIVE_COUNT_BEFORE_DEAD,
            dead_letter_target_arn: dead_letter_target_arn.into(),
        }
    }

    pub fn with_max_receive_count(mut self, max_receive_count: u32) -> Self {
        self.max_receive_count = max_receive_count;
        self
    }

    /// Returns the policy as the string value of a queue attribute.
    pub fn to_attribute(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_attribute(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}
