use serde::{Deserialize, Serialize};

use crate::{ChangeRecord, Transferable, TrailError};

/// Ordered change records describing every delta since the last flush.
pub type ChangeTrail = Vec<ChangeRecord>;

/// The three passes a flush makes over all dirty components.
///
/// Phases must run in declaration order across the whole set of dirty
/// components: tree shape first, then content, removals last.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChangeTrailPhase {
    StructuralChanges,
    ContentUpdates,
    Removal,
}

impl ChangeTrailPhase {
    pub const ALL: [ChangeTrailPhase; 3] = [
        ChangeTrailPhase::StructuralChanges,
        ChangeTrailPhase::ContentUpdates,
        ChangeTrailPhase::Removal,
    ];
}

/// Transferables stripped from a payload, keyed by the index of the
/// record they were taken from.
pub type DetachedTransferables = Vec<(usize, Vec<Transferable>)>;

/// A full sync payload: the change trail plus an optional serial the
/// receiver echoes back when confirmation is requested.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTrailPayload {
    pub change_trail: ChangeTrail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<u64>,
}

impl ChangeTrailPayload {
    pub fn new(change_trail: ChangeTrail) -> Self {
        Self {
            change_trail,
            serial: None,
        }
    }

    pub fn with_serial(mut self, serial: u64) -> Self {
        self.serial = Some(serial);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.change_trail.is_empty()
    }

    /// Moves every transferable out of the records, leaving them empty.
    pub fn take_transferables(&mut self) -> DetachedTransferables {
        let mut detached = Vec::new();
        for (index, record) in self.change_trail.iter_mut().enumerate() {
            if let ChangeRecord::SendEvents { transferables, .. } = record {
                if !transferables.is_empty() {
                    detached.push((index, std::mem::take(transferables)));
                }
            }
        }
        detached
    }

    /// Puts transferables taken by [`Self::take_transferables`] back in place.
    pub fn restore_transferables(&mut self, detached: DetachedTransferables) -> Result<(), TrailError> {
        for (index, handles) in detached {
            match self.change_trail.get_mut(index) {
                Some(ChangeRecord::SendEvents { transferables, .. }) => {
                    Transferable::extend_deduped(transferables, handles);
                }
                _ => return Err(TrailError::TransferableTarget { index }),
            }
        }
        Ok(())
    }

    /// Encodes the payload. Transferables are not part of the encoding;
    /// take them out first when they have to cross the boundary.
    pub fn to_json(&self) -> Result<String, TrailError> {
        serde_json::to_string(self).map_err(TrailError::Serialize)
    }

    pub fn from_json(json: &str) -> Result<Self, TrailError> {
        serde_json::from_str(json).map_err(TrailError::Deserialize)
    }
}
