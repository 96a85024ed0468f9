use std::fmt;

use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{ShadowObjectEvent, Transferable};

// One entry of a change trail, as sent over the wire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ChangeRecord {
    CreateEntities {
        uuid: Uuid,
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_uuid: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<i32>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        properties: Vec<PropertyChange>,
    },
    DestroyEntities {
        uuid: Uuid,
    },
    SetParent {
        uuid: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_uuid: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<i32>,
    },
    UpdateOrder {
        uuid: Uuid,
        order: i32,
    },
    ChangeToken {
        uuid: Uuid,
        token: String,
    },
    ChangeProperties {
        uuid: Uuid,
        properties: Vec<PropertyChange>,
    },
    SendEvents {
        uuid: Uuid,
        events: Vec<ShadowObjectEvent>,
        #[serde(skip)]
        transferables: Vec<Transferable>,
    },
}

impl ChangeRecord {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::CreateEntities { uuid, .. }
            | Self::DestroyEntities { uuid }
            | Self::SetParent { uuid, .. }
            | Self::UpdateOrder { uuid, .. }
            | Self::ChangeToken { uuid, .. }
            | Self::ChangeProperties { uuid, .. }
            | Self::SendEvents { uuid, .. } => *uuid,
        }
    }

    pub fn get_type(&self) -> ChangeRecordType {
        match self {
            Self::CreateEntities { .. } => ChangeRecordType::CreateEntities,
            Self::DestroyEntities { .. } => ChangeRecordType::DestroyEntities,
            Self::SetParent { .. } => ChangeRecordType::SetParent,
            Self::UpdateOrder { .. } => ChangeRecordType::UpdateOrder,
            Self::ChangeToken { .. } => ChangeRecordType::ChangeToken,
            Self::ChangeProperties { .. } => ChangeRecordType::ChangeProperties,
            Self::SendEvents { .. } => ChangeRecordType::SendEvents,
        }
    }

    pub fn transferables(&self) -> &[Transferable] {
        match self {
            Self::SendEvents { transferables, .. } => transferables,
            _ => &[],
        }
    }
}

// Discriminant of a ChangeRecord, handy for assertions & logging
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeRecordType {
    // An entity (and its initial state) comes into existence
    CreateEntities,
    // An entity is torn down
    DestroyEntities,
    // An alive entity moves under another parent, or to the roots
    SetParent,
    // An alive entity changes its sibling sort key
    UpdateOrder,
    // An alive entity switches the token its behaviours derive from
    ChangeToken,
    // Property writes & removals, in the order they were last touched
    ChangeProperties,
    // Events queued for the shadow objects of an entity
    SendEvents,
}

/// A single property write. `value == None` is an explicit removal.
///
/// Encoded as the array `[key, value]`, or `[key]` for a removal, so
/// that `null` remains an ordinary value on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    pub key: String,
    pub value: Option<Value>,
}

impl PropertyChange {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn is_removal(&self) -> bool {
        self.value.is_none()
    }
}

impl Serialize for PropertyChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.value.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.key)?;
        if let Some(value) = &self.value {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for PropertyChange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertyChangeVisitor;

        impl<'de> Visitor<'de> for PropertyChangeVisitor {
            type Value = PropertyChange;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a [key] or [key, value] array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PropertyChange, A::Error> {
                let key: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let value: Option<Value> = seq.next_element()?;
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }
                Ok(PropertyChange { key, value })
            }
        }

        deserializer.deserialize_seq(PropertyChangeVisitor)
    }
}
