use uuid::Uuid;

/// Sibling list kept sorted by `order`, ties in insertion order.
pub struct OrderedUuids {
    // front small, back big
    inner: Vec<(i32, Uuid)>,
}

impl OrderedUuids {
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    /// Inserts without re-sorting. Prepending & appending are cheap, an
    /// interior insert scans from the back for its slot.
    pub fn insert(&mut self, order: i32, uuid: Uuid) {
        let Some((first_order, _)) = self.inner.first() else {
            self.inner.push((order, uuid));
            return;
        };
        if order < *first_order {
            self.inner.insert(0, (order, uuid));
            return;
        }

        let mut current_index = self.inner.len();

        loop {
            if current_index == 0 {
                self.inner.insert(0, (order, uuid));
                return;
            }

            current_index -= 1;

            let (old_order, _) = self.inner[current_index];
            if old_order <= order {
                self.inner.insert(current_index + 1, (order, uuid));
                return;
            }
        }
    }

    pub fn remove(&mut self, uuid: &Uuid) -> bool {
        match self.inner.iter().position(|(_, known)| known == uuid) {
            Some(index) => {
                self.inner.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.inner.iter().any(|(_, known)| known == uuid)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Uuid> + '_ {
        self.inner.iter().map(|(_, uuid)| uuid)
    }

    pub fn to_vec(&self) -> Vec<Uuid> {
        self.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl Default for OrderedUuids {
    fn default() -> Self {
        Self::new()
    }
}
