//! # Branch-Versioned Tuple Storage
//!
//! Every row of every table owns a version chain: a head-inserted list of
//! tuple revisions tagged with the branch that wrote them. The master slot
//! of each chain is a [`VersionEntry`] living in the table's version
//! management array; non-master revisions are [`VersionedTupleStorage`]
//! nodes in a per-table arena that is never freed before the table drops.
//!
//! ```text
//!  version_mgmt[tid]                       version_arena
//!  ┌───────────────────┐   first   ┌─────────────┐  next  ┌─────────────┐
//!  │ VersionEntry      ├──────────▶│ rev @ b2    ├───────▶│ rev @ b1    ├──▶ Master
//!  │  branch_id, lock  │           │ ts=7, image │        │ ts=4, image │   (columns)
//!  └───────────────────┘           └─────────────┘        └─────────────┘
//! ```
//!
//! ## Visibility
//!
//! A statement executes against a branch; its *lineage* is the ordered path
//! from that branch up to master. Walking a chain from the head, the first
//! node whose branch id appears in the lineage wins — head insertion makes
//! that automatically the most recent revision for the lineage. A winning
//! tombstone means the row is deleted in that branch. The master slot itself
//! is the terminal pseudo-node: it wins when the row's creating branch is in
//! the lineage, and materialises from the columnar store.
//!
//! ## Master is destructive
//!
//! Updates in master rewrite the columnar slots in place; no chain node is
//! created and the prior image is gone. Only non-master updates allocate
//! revisions.
//!
//! ## Dangling rows
//!
//! Rows born in a non-master branch have no columnar slots; their entries
//! live in the dangling array and their tids carry the dangling top bit.
//! Such entries track visibility in a per-entry branch bitset instead of the
//! table's branch bitmap.
//!
//! ## Locking
//!
//! Chain splices take the entry's optimistic lock (acquire before touching
//! the head, release after the new head is published); contended acquisition
//! retries up to a bound and then surfaces `VersionError::Retry`.

pub mod chain;
pub mod manager;
pub mod opt_lock;

pub use chain::{BranchBitSet, ChainRef, VersionEntry, VersionedTupleStorage};
pub use manager::{
    construct_branch_lineage, delete_tuple, get_earliest_tuple, get_latest_tuple, get_tuple,
    insert_tuple, is_visible_in_branch, scan_relation, update_tuple, Lineage,
};
pub use opt_lock::OptLock;
