pub mod helpers;

pub use helpers::*;
pub use shadow_objects_shared::ChangeRecordType;
