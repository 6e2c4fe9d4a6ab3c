//! # Table: Columns, Bitmaps, and Version Arrays
//!
//! A [`Table`] is a named ordered list of columns, each backed by a
//! fixed-width [`Vector`], plus:
//!
//! - the null-indicator [`BitmapTable`] (one column per nullable SQL column),
//! - the branch-visibility [`BitmapTable`] (exactly one column per branch,
//!   indexed by branch id),
//! - the version-management arrays (`version_mgmt` for rows born in master,
//!   `dangling_version_mgmt` for rows born elsewhere) and the shared node
//!   arena,
//! - the text pool for long string payloads.
//!
//! ## Packed tuple images
//!
//! Version-chain nodes store rows as packed images: a null-indicator mask
//! (one byte per eight columns) followed by every field's fixed-width slot in
//! column order. `pack_tuple`/`unpack_tuple` implement that layout on top of
//! the value model's `store`/`load`.
//!
//! ## Row addressing
//!
//! Regular rows are addressed by tid into the columns and bitmaps. A tid
//! with the dangling top bit set addresses `dangling_version_mgmt` instead
//! and has no columnar slots; see the `version` module.

use crate::config::BITMAP_COLUMN_HINT;
use crate::error::SemanticError;
use crate::storage::bitmap::BitmapTable;
use crate::storage::stable_vec::StableVec;
use crate::storage::text_pool::TextPool;
use crate::storage::vector::Vector;
use crate::types::{SqlTuple, SqlType, Tid, Value};
use crate::version::{VersionEntry, VersionedTupleStorage};
use hashbrown::HashMap;

/// Where a column's null indicator lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullIndicatorType {
    /// Carried inside the value encoding itself (unused by the current
    /// layouts, kept for embedded-indicator types).
    Embedded,
    /// One column of the table's null bitmap.
    Column,
}

/// Runtime description of one column.
#[derive(Debug, Clone)]
pub struct ColumnInformation {
    pub name: String,
    pub ty: SqlType,
    /// Position in the table's column order.
    pub index: usize,
    pub null_indicator: NullIndicatorType,
    /// Column index in the null bitmap, when `null_indicator == Column`.
    pub null_column: usize,
}

pub struct Table {
    name: String,
    columns: Vec<(ColumnInformation, Vector)>,
    columns_by_name: HashMap<String, usize>,
    null_indicators: BitmapTable,
    branch_bitmap: BitmapTable,
    pub(crate) version_mgmt: StableVec<VersionEntry>,
    pub(crate) dangling_version_mgmt: StableVec<VersionEntry>,
    pub(crate) version_arena: StableVec<VersionedTupleStorage>,
    text_pool: TextPool,
}

impl Table {
    /// Creates an empty table with one branch-visibility column per
    /// currently existing branch.
    pub fn new(name: impl Into<String>, branch_count: usize) -> Self {
        let branch_bitmap = BitmapTable::with_column_hint(BITMAP_COLUMN_HINT.max(branch_count));
        for _ in 0..branch_count.max(1) {
            branch_bitmap.add_column();
        }
        Self {
            name: name.into(),
            columns: Vec::new(),
            columns_by_name: HashMap::new(),
            null_indicators: BitmapTable::with_column_hint(BITMAP_COLUMN_HINT),
            branch_bitmap,
            version_mgmt: StableVec::new(),
            dangling_version_mgmt: StableVec::new(),
            version_arena: StableVec::new(),
            text_pool: TextPool::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a column; rejects duplicate names.
    pub fn add_column(&mut self, name: &str, ty: SqlType) -> Result<(), SemanticError> {
        if self.columns_by_name.contains_key(name) {
            return Err(SemanticError::DuplicateColumn(name.to_string()));
        }
        let index = self.columns.len();
        let (null_indicator, null_column) = if ty.nullable {
            (NullIndicatorType::Column, self.null_indicators.add_column())
        } else {
            (NullIndicatorType::Column, usize::MAX)
        };
        let ci = ColumnInformation {
            name: name.to_string(),
            ty,
            index,
            null_indicator,
            null_column,
        };
        self.columns.push((ci, Vector::new(ty.slot_size())));
        self.columns_by_name.insert(name.to_string(), index);
        Ok(())
    }

    /// Appends one zeroed row in every column and both bitmaps, visible in
    /// `branch_id`; returns the new tid.
    pub fn add_row(&self, branch_id: crate::types::BranchId) -> Tid {
        let tid = self.size() as Tid;
        for (_, vector) in &self.columns {
            vector.push_back_uninit();
        }
        self.null_indicators.add_row();
        self.branch_bitmap.add_row();
        self.branch_bitmap.set(tid, branch_id as usize, true);
        tid
    }

    /// Widens the branch bitmap for a newly created branch, copying the
    /// parent's visibility column, and mirrors the parent bit on every
    /// dangling entry.
    pub fn create_branch(&self, parent: crate::types::BranchId, child: crate::types::BranchId) {
        let column = self.branch_bitmap.add_column_copy_of(parent as usize);
        debug_assert_eq!(column, child as usize);
        for entry in self.dangling_version_mgmt.iter() {
            let mut bits = entry.branch_visibility.borrow_mut();
            if bits.contains(parent) {
                bits.set(child);
            }
        }
    }

    /// Column descriptor lookup by name.
    pub fn get_ci(&self, column_name: &str) -> Option<&ColumnInformation> {
        self.columns_by_name
            .get(column_name)
            .map(|&idx| &self.columns[idx].0)
    }

    pub fn column(&self, index: usize) -> &Vector {
        &self.columns[index].1
    }

    pub fn column_info(&self, index: usize) -> &ColumnInformation {
        &self.columns[index].0
    }

    /// The count of SQL columns (null indicators excluded).
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(ci, _)| ci.name.as_str())
    }

    pub fn tuple_types(&self) -> Vec<SqlType> {
        self.columns.iter().map(|(ci, _)| ci.ty).collect()
    }

    /// Rows in the master store (dangling rows excluded).
    pub fn size(&self) -> usize {
        self.columns.first().map_or(0, |(_, v)| v.len())
    }

    pub fn dangling_size(&self) -> usize {
        self.dangling_version_mgmt.len()
    }

    pub fn null_indicators(&self) -> &BitmapTable {
        &self.null_indicators
    }

    pub fn branch_bitmap(&self) -> &BitmapTable {
        &self.branch_bitmap
    }

    pub fn text_pool(&self) -> &TextPool {
        &self.text_pool
    }

    // ------------------------------------------------------------------
    // Master-row access

    /// Writes a full tuple into the columnar slots at `tid`.
    pub fn write_master_tuple(&self, tid: Tid, tuple: &SqlTuple) {
        debug_assert_eq!(tuple.values.len(), self.columns.len());
        for ((ci, vector), value) in self.columns.iter().zip(&tuple.values) {
            let slot =
                unsafe { std::slice::from_raw_parts_mut(vector.at_mut(tid as usize), vector.element_size()) };
            value.store(slot, &self.text_pool);
            if ci.ty.nullable {
                self.null_indicators.set(tid, ci.null_column, value.is_null());
            }
        }
    }

    /// Reads one column of a master row.
    pub fn read_master_value(&self, tid: Tid, column: usize) -> Value {
        let (ci, vector) = &self.columns[column];
        if ci.ty.nullable && self.null_indicators.get(tid, ci.null_column) {
            return Value::Null;
        }
        Value::load(vector.slot(tid as usize), ci.ty)
    }

    /// Materialises the full master image of a row.
    pub fn read_master_tuple(&self, tid: Tid) -> SqlTuple {
        SqlTuple::new(
            (0..self.columns.len())
                .map(|c| self.read_master_value(tid, c))
                .collect(),
        )
    }

    // ------------------------------------------------------------------
    // Packed tuple images (version-chain nodes)

    fn null_mask_len(&self) -> usize {
        self.columns.len().div_ceil(8)
    }

    /// Bytes of one packed image: null mask + fixed-width fields.
    pub fn image_size(&self) -> usize {
        self.null_mask_len()
            + self
                .columns
                .iter()
                .map(|(ci, _)| ci.ty.slot_size())
                .sum::<usize>()
    }

    /// Packs a tuple into the version-chain image layout.
    pub fn pack_tuple(&self, tuple: &SqlTuple) -> Box<[u8]> {
        debug_assert_eq!(tuple.values.len(), self.columns.len());
        let mut image = vec![0u8; self.image_size()];
        let mask_len = self.null_mask_len();
        let mut offset = mask_len;
        for (i, ((ci, _), value)) in self.columns.iter().zip(&tuple.values).enumerate() {
            let width = ci.ty.slot_size();
            if value.is_null() {
                image[i / 8] |= 1 << (i % 8);
            } else {
                value.store(&mut image[offset..offset + width], &self.text_pool);
            }
            offset += width;
        }
        image.into_boxed_slice()
    }

    /// Reads one column out of a packed image.
    pub fn unpack_value(&self, image: &[u8], column: usize) -> Value {
        if image[column / 8] >> (column % 8) & 1 != 0 {
            return Value::Null;
        }
        let mut offset = self.null_mask_len();
        for (ci, _) in self.columns.iter().take(column) {
            offset += ci.ty.slot_size();
        }
        let ty = self.columns[column].0.ty;
        Value::load(&image[offset..offset + ty.slot_size()], ty)
    }

    /// Unpacks the whole image back into a tuple.
    pub fn unpack_tuple(&self, image: &[u8]) -> SqlTuple {
        SqlTuple::new(
            (0..self.columns.len())
                .map(|c| self.unpack_value(image, c))
                .collect(),
        )
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("rows", &self.size())
            .field("dangling", &self.dangling_size())
            .finish()
    }
}
