use std::fmt;
use std::ops::Sub;

/// Elements with a logical "width" (eg. when used in an [`OffsetVec`])
pub trait Width {
    fn width(&self) -> usize;
}

/// Offset into an [`OffsetVec`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl Sub for Offset {
    type Output = isize;

    fn sub(self, other: Offset) -> isize {
        (self.0 as isize) - (other.0 as isize)
    }
}

/// A vector of elements of different logical widths, where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// The constant pool is the motivating case: most entries occupy one index slot, but `Long` and
/// `Double` entries occupy two (the second slot is an unusable tombstone), and indexing starts
/// at 1.
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,

    /// Offset for the first element (usually 0, but sometimes 1)
    initial_offset: Offset,
}

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty offset vector, with a custom starting offset
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Number of entries (tombstone slots do not count)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the next element to be added
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back, returning its offset
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));
        offset
    }

    /// Get an entry by its offset in the vector
    ///
    /// Offsets that point into the middle of a wide entry resolve to nothing.
    pub fn get_offset(&self, offset: Offset) -> Option<&T> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Ok(found_idx) => Some(&self.entries[found_idx].1),
            Err(_) => None,
        }
    }

    /// Iterate over `(offset, entry)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (Offset, &T)> + '_ {
        self.entries.iter().map(|(off, entry)| (*off, entry))
    }

    /// Iterate over entries mutably, without touching offsets
    ///
    /// Callers must not change entry widths through this.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Offset, &mut T)> + '_ {
        self.entries.iter_mut().map(|(off, entry)| (*off, entry))
    }

    /// Drop all entries, keeping the starting offset
    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset_len = self.initial_offset;
    }
}

impl<T: Sized + Width> Default for OffsetVec<T> {
    fn default() -> OffsetVec<T> {
        OffsetVec::new()
    }
}

impl<T: Sized + Width + fmt::Debug> fmt::Debug for OffsetVec<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter().map(|(off, entry)| (off.0, entry))).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Slot(usize);

    impl Width for Slot {
        fn width(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn offsets_accumulate_widths() {
        let mut vec: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        assert_eq!(vec.push(Slot(1)), Offset(1));
        assert_eq!(vec.push(Slot(2)), Offset(2));
        assert_eq!(vec.push(Slot(1)), Offset(4));
        assert_eq!(vec.offset_len(), Offset(5));
        assert_eq!(vec.len(), 3);
    }

    #[test]
    fn tombstone_offsets_resolve_to_nothing() {
        let mut vec: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        vec.push(Slot(2));
        vec.push(Slot(1));
        assert!(vec.get_offset(Offset(1)).is_some());
        assert!(vec.get_offset(Offset(2)).is_none());
        assert!(vec.get_offset(Offset(3)).is_some());
    }
}
