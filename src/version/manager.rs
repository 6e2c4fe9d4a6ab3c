//! # Version Manager Operations
//!
//! The only code that mutates table storage. Operations take the target
//! branch explicitly plus the statement's [`ExecutionContext`] (for the
//! lineage cache, timestamps, and cancellation).
//!
//! | Operation | Master branch | Other branch |
//! |-----------|---------------|--------------|
//! | insert | append columnar row + entry | append dangling entry + image node |
//! | update | destructive in-place rewrite | splice revision at chain head |
//! | delete | tombstone + clear bit | tombstone + clear bit |
//! | get_latest | read columns directly | walk chain through the lineage |
//!
//! ## Chain walk
//!
//! `get_latest_chain_element` walks `entry.first` following `next`; the
//! first element whose branch id is in the active lineage wins. Head
//! insertion keeps chains sorted by decreasing creation timestamp, so the
//! winner is automatically the newest revision for that lineage. A winning
//! tombstone yields null. Reaching the `Master` terminal wins iff the row's
//! creating branch is in the lineage.

use crate::error::{Error, Result, RuntimeError};
use crate::exec::context::ExecutionContext;
use crate::storage::Table;
use crate::types::{
    is_dangling, mark_dangling, strip_dangling, BranchId, SqlTuple, Tid, MASTER_BRANCH_ID,
};
use crate::version::chain::{ChainRef, VersionEntry, VersionedTupleStorage};
use smallvec::SmallVec;

/// Ordered branch path, active branch first, master last.
pub type Lineage = SmallVec<[BranchId; 8]>;

/// The element of a row's chain a scan materialises from.
#[derive(Debug, Clone, Copy)]
pub enum ChainElement<'t> {
    /// The current columnar image.
    Master,
    /// A stored revision.
    Node(&'t VersionedTupleStorage),
}

/// Convenience wrapper over the context's lineage cache.
pub fn construct_branch_lineage(branch: BranchId, ctx: &ExecutionContext<'_>) -> Lineage {
    ctx.lineage(branch)
}

/// Branch-visibility test for one row.
///
/// Regular rows consult the table's branch bitmap; dangling rows consult
/// their entry's bitset.
pub fn is_visible_in_branch(table: &Table, tid: Tid, branch: BranchId) -> bool {
    if is_dangling(tid) {
        let index = strip_dangling(tid) as usize;
        if index >= table.dangling_version_mgmt.len() {
            return false;
        }
        table
            .dangling_version_mgmt
            .get(index)
            .branch_visibility
            .borrow()
            .contains(branch)
    } else {
        let index = tid as usize;
        index < table.branch_bitmap().row_count()
            && (branch as usize) < table.branch_bitmap().column_count()
            && table.branch_bitmap().get(tid, branch as usize)
    }
}

fn version_entry(table: &Table, tid: Tid) -> Option<&VersionEntry> {
    if is_dangling(tid) {
        let index = strip_dangling(tid) as usize;
        (index < table.dangling_version_mgmt.len())
            .then(|| table.dangling_version_mgmt.get(index))
    } else {
        let index = tid as usize;
        (index < table.version_mgmt.len()).then(|| table.version_mgmt.get(index))
    }
}

/// First chain element whose branch is in the lineage; `Null` when the row
/// is invisible or tombstoned in that lineage.
pub(crate) fn get_latest_chain_element(
    entry: &VersionEntry,
    table: &Table,
    lineage: &Lineage,
) -> ChainRef {
    let mut current = entry.first.get();
    loop {
        match current {
            ChainRef::Null => return ChainRef::Null,
            ChainRef::Master => {
                return if lineage.contains(&entry.branch_id.get()) {
                    ChainRef::Master
                } else {
                    ChainRef::Null
                };
            }
            ChainRef::Version(idx) => {
                let node = table.version_arena.get(idx as usize);
                if lineage.contains(&node.branch_id) {
                    return if node.tombstone { ChainRef::Null } else { current };
                }
                current = node.next.get();
            }
        }
    }
}

/// Inserts a tuple into `branch`; returns the new tid (dangling-flagged for
/// non-master branches).
pub fn insert_tuple(
    tuple: &SqlTuple,
    table: &Table,
    ctx: &ExecutionContext<'_>,
    branch: BranchId,
) -> Result<Tid> {
    let ts = ctx.db.next_timestamp();
    if branch == MASTER_BRANCH_ID {
        let tid = table.add_row(MASTER_BRANCH_ID);
        table.write_master_tuple(tid, tuple);
        let entry = VersionEntry::new(MASTER_BRANCH_ID, ts);
        let index = table.version_mgmt.push(entry);
        debug_assert_eq!(index as Tid, tid);
        for descendant in ctx.db.strict_descendants(MASTER_BRANCH_ID) {
            table.branch_bitmap().set(tid, descendant as usize, true);
        }
        Ok(tid)
    } else {
        let image = table.pack_tuple(tuple);
        let node = VersionedTupleStorage::revision(branch, ts, image);
        let node_idx = table.version_arena.push(node) as u32;
        let entry = VersionEntry::new(branch, ts);
        entry.first.set(ChainRef::Version(node_idx));
        entry.next_in_branch.set(ChainRef::Version(node_idx));
        {
            let mut bits = entry.branch_visibility.borrow_mut();
            bits.set(branch);
            for descendant in ctx.db.strict_descendants(branch) {
                bits.set(descendant);
            }
        }
        let index = table.dangling_version_mgmt.push(entry) as Tid;
        Ok(mark_dangling(index))
    }
}

/// Rewrites the row in `branch`. Master updates are destructive; any other
/// branch gets a fresh revision spliced at the chain head under the entry's
/// optimistic lock.
pub fn update_tuple(
    tid: Tid,
    tuple: &SqlTuple,
    table: &Table,
    ctx: &ExecutionContext<'_>,
    branch: BranchId,
) -> Result<()> {
    let entry =
        version_entry(table, tid).ok_or(Error::Runtime(RuntimeError::NotFound(tid)))?;
    let _guard = entry.lock.acquire().map_err(Error::Version)?;

    if branch == MASTER_BRANCH_ID && !is_dangling(tid) {
        // The prior image is not retained: versioning in master is
        // destructive.
        table.write_master_tuple(tid, tuple);
        return Ok(());
    }

    let ts = ctx.db.next_timestamp();
    let image = table.pack_tuple(tuple);
    let node = VersionedTupleStorage::revision(branch, ts, image);

    let head = entry.first.get();
    node.next.set(head);
    node.next_in_branch
        .set(branch_head(entry, table, branch));

    let node_idx = table.version_arena.push(node) as u32;
    entry.first.set(ChainRef::Version(node_idx));

    if is_dangling(tid) {
        entry.branch_visibility.borrow_mut().set(branch);
    } else {
        table.branch_bitmap().set(tid, branch as usize, true);
    }
    Ok(())
}

/// Marks the row deleted in `branch` by splicing a tombstone; sibling
/// branches keep whatever revision their own lineage reaches.
pub fn delete_tuple(
    tid: Tid,
    table: &Table,
    ctx: &ExecutionContext<'_>,
    branch: BranchId,
) -> Result<()> {
    let entry =
        version_entry(table, tid).ok_or(Error::Runtime(RuntimeError::NotFound(tid)))?;
    let _guard = entry.lock.acquire().map_err(Error::Version)?;

    let ts = ctx.db.next_timestamp();
    let node = VersionedTupleStorage::tombstone(branch, ts);
    node.next.set(entry.first.get());
    node.next_in_branch
        .set(branch_head(entry, table, branch));
    let node_idx = table.version_arena.push(node) as u32;
    entry.first.set(ChainRef::Version(node_idx));

    if is_dangling(tid) {
        entry.branch_visibility.borrow_mut().clear(branch);
    } else if (branch as usize) < table.branch_bitmap().column_count() {
        table.branch_bitmap().set(tid, branch as usize, false);
    }
    Ok(())
}

/// Newest chain element written by exactly `branch`, for the per-branch
/// chain links.
fn branch_head(entry: &VersionEntry, table: &Table, branch: BranchId) -> ChainRef {
    let mut current = entry.first.get();
    loop {
        match current {
            ChainRef::Null => return ChainRef::Null,
            ChainRef::Master => {
                return if entry.branch_id.get() == branch {
                    ChainRef::Master
                } else {
                    ChainRef::Null
                };
            }
            ChainRef::Version(idx) => {
                let node = table.version_arena.get(idx as usize);
                if node.branch_id == branch {
                    return current;
                }
                current = node.next.get();
            }
        }
    }
}

/// Latest revision of the row visible in `branch`, or `None`.
pub fn get_latest_tuple(
    tid: Tid,
    table: &Table,
    ctx: &ExecutionContext<'_>,
    branch: BranchId,
) -> Result<Option<SqlTuple>> {
    if branch == MASTER_BRANCH_ID && !is_dangling(tid) {
        if (tid as usize) >= table.size() || !is_visible_in_branch(table, tid, branch) {
            return Ok(None);
        }
        return Ok(Some(table.read_master_tuple(tid)));
    }
    let Some(entry) = version_entry(table, tid) else {
        return Ok(None);
    };
    let lineage = ctx.lineage(branch);
    Ok(materialise(table, tid, get_latest_chain_element(entry, table, &lineage)))
}

/// The n-th most recent revision visible in `branch` (offset 0 = latest).
pub fn get_tuple(
    tid: Tid,
    revision_offset: usize,
    table: &Table,
    ctx: &ExecutionContext<'_>,
    branch: BranchId,
) -> Result<Option<SqlTuple>> {
    let Some(entry) = version_entry(table, tid) else {
        return Ok(None);
    };
    let lineage = ctx.lineage(branch);
    let mut remaining = revision_offset;
    let mut current = entry.first.get();
    loop {
        match current {
            ChainRef::Null => return Ok(None),
            ChainRef::Master => {
                if lineage.contains(&entry.branch_id.get()) && remaining == 0 {
                    return Ok(materialise(table, tid, ChainRef::Master));
                }
                return Ok(None);
            }
            ChainRef::Version(idx) => {
                let node = table.version_arena.get(idx as usize);
                if lineage.contains(&node.branch_id) {
                    if remaining == 0 {
                        if node.tombstone {
                            return Ok(None);
                        }
                        return Ok(materialise(table, tid, current));
                    }
                    remaining -= 1;
                }
                current = node.next.get();
            }
        }
    }
}

/// The oldest revision of the row reachable through `branch`'s lineage.
pub fn get_earliest_tuple(
    tid: Tid,
    table: &Table,
    ctx: &ExecutionContext<'_>,
    branch: BranchId,
) -> Result<Option<SqlTuple>> {
    let Some(entry) = version_entry(table, tid) else {
        return Ok(None);
    };
    let lineage = ctx.lineage(branch);
    let mut earliest = ChainRef::Null;
    let mut current = entry.first.get();
    loop {
        match current {
            ChainRef::Null => break,
            ChainRef::Master => {
                if lineage.contains(&entry.branch_id.get()) {
                    earliest = ChainRef::Master;
                }
                break;
            }
            ChainRef::Version(idx) => {
                let node = table.version_arena.get(idx as usize);
                if lineage.contains(&node.branch_id) && !node.tombstone {
                    earliest = current;
                }
                current = node.next.get();
            }
        }
    }
    Ok(materialise(table, tid, earliest))
}

fn materialise(table: &Table, tid: Tid, element: ChainRef) -> Option<SqlTuple> {
    match element {
        ChainRef::Null => None,
        ChainRef::Master => {
            debug_assert!(!is_dangling(tid), "dangling rows have no columnar image");
            Some(table.read_master_tuple(tid))
        }
        ChainRef::Version(idx) => {
            Some(table.unpack_tuple(&table.version_arena.get(idx as usize).data))
        }
    }
}

/// Drives a visibility-filtered scan of `table` in `branch`, invoking `f`
/// with each visible tid and the chain element to materialise from.
///
/// Master scans take the columnar fast path. Other branches walk the chain
/// per row, then sweep the dangling array (tids carry the dangling bit).
pub fn scan_relation<'t, F>(
    table: &'t Table,
    ctx: &ExecutionContext<'_>,
    branch: BranchId,
    mut f: F,
) -> Result<()>
where
    F: FnMut(Tid, ChainElement<'t>) -> Result<()>,
{
    if branch == MASTER_BRANCH_ID {
        for tid in 0..table.size() as Tid {
            ctx.check_cancelled()?;
            if is_visible_in_branch(table, tid, MASTER_BRANCH_ID) {
                f(tid, ChainElement::Master)?;
            }
        }
        return Ok(());
    }

    let lineage = ctx.lineage(branch);
    for tid in 0..table.size() as Tid {
        ctx.check_cancelled()?;
        if !is_visible_in_branch(table, tid, branch) {
            continue;
        }
        let entry = table.version_mgmt.get(tid as usize);
        match get_latest_chain_element(entry, table, &lineage) {
            ChainRef::Null => {}
            ChainRef::Master => f(tid, ChainElement::Master)?,
            ChainRef::Version(idx) => {
                f(tid, ChainElement::Node(table.version_arena.get(idx as usize)))?
            }
        }
    }
    for index in 0..table.dangling_version_mgmt.len() {
        ctx.check_cancelled()?;
        let tid = mark_dangling(index as Tid);
        if !is_visible_in_branch(table, tid, branch) {
            continue;
        }
        let entry = table.dangling_version_mgmt.get(index);
        match get_latest_chain_element(entry, table, &lineage) {
            ChainRef::Null | ChainRef::Master => {}
            ChainRef::Version(idx) => {
                f(tid, ChainElement::Node(table.version_arena.get(idx as usize)))?
            }
        }
    }
    Ok(())
}
