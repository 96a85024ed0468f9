/// Namespace of the component context every view component lands in
/// unless told otherwise.
pub const GLOBAL_NAMESPACE: &str = "global";

/// Sibling sort key of components created without an explicit order.
pub const DEFAULT_ORDER: i32 = 0;

/// View-side event broadcast to every live component after the mirror
/// side has been lost and the change state was re-created.
pub const CONTEXT_LOST_EVENT: &str = "contextLost";
