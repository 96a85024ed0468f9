use std::{fmt, sync::Arc};

/// Handle to a binary resource whose ownership moves with an event
/// instead of being copied into the serialized payload.
///
/// Two handles are equal only when they point at the same buffer, which
/// is what de-duplication of accumulated transferables relies on.
#[derive(Clone)]
pub struct Transferable {
    buffer: Arc<[u8]>,
}

impl Transferable {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            buffer: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn same_resource(&self, other: &Transferable) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Appends every handle of `incoming` not already present in `target`.
    pub fn extend_deduped(target: &mut Vec<Transferable>, incoming: impl IntoIterator<Item = Transferable>) {
        for transferable in incoming {
            if !target.iter().any(|known| known.same_resource(&transferable)) {
                target.push(transferable);
            }
        }
    }
}

impl PartialEq for Transferable {
    fn eq(&self, other: &Self) -> bool {
        self.same_resource(other)
    }
}

impl Eq for Transferable {}

impl fmt::Debug for Transferable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transferable({:p}, {} bytes)", Arc::as_ptr(&self.buffer), self.buffer.len())
    }
}

impl From<Vec<u8>> for Transferable {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
