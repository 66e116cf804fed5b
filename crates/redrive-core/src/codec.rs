//! JSON encoding of message bodies.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::QueueError;
use crate::transport::Message;

/// Serializes an outbound payload into a message body.
pub fn encode<P: Serialize + ?Sized>(payload: &P) -> Result<String, QueueError> {
    serde_json::to_string(payload).map_err(QueueError::Encode)
}

/// Decodes the body of `message` into a fresh `T`.
pub fn decode<T: DeserializeOwned>(message: &Message) -> Result<T, QueueError> {
    serde_json::from_str(&message.body).map_err(|source| QueueError::Decode {
        message_id: message.message_id.clone(),
        source,
    })
}
