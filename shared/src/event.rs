use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An event dispatched from a view component to the shadow objects of
/// its entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowObjectEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl ShadowObjectEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// A message travelling the other way, from a shadow object back to the
/// view component its entity mirrors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageToView {
    pub uuid: Uuid,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: Value,
}
