use thiserror::Error;

/// Errors that can occur while encoding, decoding or reassembling a
/// change-trail payload.
#[derive(Debug, Error)]
pub enum TrailError {
    /// The payload could not be encoded, usually because a property or
    /// event value is not representable on the wire
    #[error("Failed to serialize change trail: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The incoming bytes are not a valid change-trail payload
    #[error("Failed to deserialize change trail: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// Detached transferables point at a record that does not exist or
    /// cannot carry transferables
    #[error("Cannot restore transferables onto record {index} - expected a SendEvents record")]
    TransferableTarget { index: usize },
}
