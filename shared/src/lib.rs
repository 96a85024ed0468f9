//! # Shadow Objects Shared
//! Change-trail wire format shared between the shadow-objects view &
//! kernel crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod change_record;
mod change_trail;
mod constants;
mod error;
mod event;
mod ordered_uuids;
mod transferable;
mod truthy;

pub use change_record::{ChangeRecord, ChangeRecordType, PropertyChange};
pub use change_trail::{ChangeTrail, ChangeTrailPayload, ChangeTrailPhase, DetachedTransferables};
pub use constants::{CONTEXT_LOST_EVENT, DEFAULT_ORDER, GLOBAL_NAMESPACE};
pub use error::TrailError;
pub use event::{MessageToView, ShadowObjectEvent};
pub use ordered_uuids::OrderedUuids;
pub use transferable::Transferable;
pub use truthy::is_truthy;

pub use serde_json::Value;
pub use uuid::Uuid;
