/// Slot vector with a free list. Handles are `slot + 1`, so `0` stays invalid.
#[derive(Debug)]
pub(crate) struct SlotTable<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> SlotTable<T> {
    /// Handle the next `insert` will return.
    pub fn vacant_handle(&self) -> u64 {
        self.free.last().copied().unwrap_or(self.slots.len()) as u64 + 1
    }

    pub fn insert(&mut self, value: T) -> u64 {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(value);
                slot
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        };
        slot as u64 + 1
    }

    #[inline]
    fn slot(handle: u64) -> Option<usize> {
        handle.checked_sub(1).map(|s| s as usize)
    }

    pub fn get(&self, handle: u64) -> Option<&T> {
        self.slots.get(Self::slot(handle)?)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: u64) -> Option<&mut T> {
        self.slots.get_mut(Self::slot(handle)?)?.as_mut()
    }

    /// Frees the slot. Unknown or already freed handles return `None`.
    pub fn remove(&mut self, handle: u64) -> Option<T> {
        let slot = Self::slot(handle)?;
        let value = self.slots.get_mut(slot)?.take()?;
        self.free.push(slot);
        Some(value)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
