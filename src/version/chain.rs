//! Version-chain node types.
//!
//! Chain links are [`ChainRef`]s: indices into the owning table's node arena
//! or the `Master` terminal that stands for the row's columnar image. Links
//! are never owning pointers, so chains can share structure freely across
//! branches while the arena retains every node until the table drops.

use crate::types::BranchId;
use crate::version::opt_lock::OptLock;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};

/// Link to the next element of a version chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainRef {
    /// End of chain / no element.
    Null,
    /// The master slot itself: materialise from the table's columns.
    Master,
    /// Index into the table's version-node arena.
    Version(u32),
}

/// Per-row chain head, stored in the table's version management array.
///
/// `first` points at the newest chain element (`Master` while the row only
/// exists in the columnar store). `branch_id` is the branch that created the
/// row; `creation_ts` the logical timestamp of that insert. The lock guards
/// every chain-head splice.
#[derive(Debug)]
pub struct VersionEntry {
    pub first: Cell<ChainRef>,
    pub next: Cell<ChainRef>,
    pub next_in_branch: Cell<ChainRef>,
    pub branch_id: Cell<BranchId>,
    pub creation_ts: Cell<u64>,
    pub lock: OptLock,
    /// Visibility bitset for dangling rows (regular rows use the table's
    /// branch bitmap, indexed by tid).
    pub branch_visibility: RefCell<BranchBitSet>,
}

impl VersionEntry {
    pub fn new(branch_id: BranchId, creation_ts: u64) -> Self {
        Self {
            first: Cell::new(ChainRef::Master),
            next: Cell::new(ChainRef::Null),
            next_in_branch: Cell::new(ChainRef::Null),
            branch_id: Cell::new(branch_id),
            creation_ts: Cell::new(creation_ts),
            lock: OptLock::new(),
            branch_visibility: RefCell::new(BranchBitSet::default()),
        }
    }
}

/// A non-master revision: header plus the packed tuple image.
///
/// The image is the row's fixed-width fields in column order, preceded by a
/// null-indicator mask (one byte per eight columns) so nullable revisions
/// round-trip without consulting the table's null bitmap.
#[derive(Debug)]
pub struct VersionedTupleStorage {
    pub next: Cell<ChainRef>,
    pub next_in_branch: Cell<ChainRef>,
    pub branch_id: BranchId,
    pub creation_ts: u64,
    pub tombstone: bool,
    pub data: Box<[u8]>,
}

impl VersionedTupleStorage {
    pub fn revision(branch_id: BranchId, creation_ts: u64, data: Box<[u8]>) -> Self {
        Self {
            next: Cell::new(ChainRef::Null),
            next_in_branch: Cell::new(ChainRef::Null),
            branch_id,
            creation_ts,
            tombstone: false,
            data,
        }
    }

    /// A deletion marker; the tuple image is unused.
    pub fn tombstone(branch_id: BranchId, creation_ts: u64) -> Self {
        Self {
            next: Cell::new(ChainRef::Null),
            next_in_branch: Cell::new(ChainRef::Null),
            branch_id,
            creation_ts,
            tombstone: true,
            data: Box::new([]),
        }
    }
}

/// Grow-on-demand branch bitset for dangling entries.
#[derive(Debug, Default, Clone)]
pub struct BranchBitSet {
    words: SmallVec<[u64; 2]>,
}

impl BranchBitSet {
    pub fn set(&mut self, branch: BranchId) {
        let word = branch as usize / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (branch % 64);
    }

    pub fn clear(&mut self, branch: BranchId) {
        let word = branch as usize / 64;
        if let Some(w) = self.words.get_mut(word) {
            *w &= !(1 << (branch % 64));
        }
    }

    pub fn contains(&self, branch: BranchId) -> bool {
        self.words
            .get(branch as usize / 64)
            .is_some_and(|w| w >> (branch % 64) & 1 != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_points_at_master() {
        let entry = VersionEntry::new(0, 1);
        assert_eq!(entry.first.get(), ChainRef::Master);
        assert_eq!(entry.next_in_branch.get(), ChainRef::Null);
    }

    #[test]
    fn branch_bitset_grows_on_demand() {
        let mut set = BranchBitSet::default();
        assert!(!set.contains(0));
        set.set(0);
        set.set(130);
        assert!(set.contains(0));
        assert!(set.contains(130));
        assert!(!set.contains(129));
        set.clear(130);
        assert!(!set.contains(130));
    }

    #[test]
    fn tombstone_has_empty_image() {
        let node = VersionedTupleStorage::tombstone(3, 9);
        assert!(node.tombstone);
        assert!(node.data.is_empty());
        assert_eq!(node.branch_id, 3);
    }
}
