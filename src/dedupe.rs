use crate::types::Offset;
use std::collections::HashMap;

/// Pointer reserved for "no data"; never handed out by [`PointerIndex`]
pub const NO_DATA_POINTER: u64 = 0;

/// Assigns dense surrogate pointers to distinct payload offsets.
///
/// Many networks reference the same payload, so keying on the payload's
/// offset finds duplicates without decoding or comparing records. Pointers
/// start at 1 and are assigned in first-seen order; a mapping never changes
/// once made.
#[derive(Debug)]
pub struct PointerIndex {
    pointers: HashMap<Offset, u64>,
    next: u64,
}

impl PointerIndex {
    pub fn new() -> Self {
        PointerIndex {
            pointers: HashMap::new(),
            next: NO_DATA_POINTER + 1,
        }
    }

    /// Pointer for `offset`, and whether it was assigned by this call
    pub fn resolve(&mut self, offset: Offset) -> (u64, bool) {
        if let Some(&pointer) = self.pointers.get(&offset) {
            return (pointer, false);
        }

        let pointer = self.next;
        self.next += 1;
        self.pointers.insert(offset, pointer);
        (pointer, true)
    }

    /// Pointer already assigned to `offset`, without assigning one
    pub fn get(&self, offset: Offset) -> Option<u64> {
        self.pointers.get(&offset).copied()
    }

    /// Number of distinct offsets seen so far
    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }
}

impl Default for PointerIndex {
    fn default() -> Self {
        Self::new()
    }
}
