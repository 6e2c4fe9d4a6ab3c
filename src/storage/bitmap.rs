//! # Packed Bit Matrix
//!
//! [`BitmapTable`] is a rows × columns bit matrix packed row-major, eight
//! columns per byte. Each table keeps two: the null-indicator matrix (one
//! column per nullable SQL column) and the branch-visibility matrix (exactly
//! one column per branch).
//!
//! `add_column` widens every row; when the packed row runs out of spare bits
//! the backing buffer is rebuilt with a wider row stride (row data has no
//! pointer-stability contract, unlike column slots). `add_row` appends one
//! zeroed row. `get`/`set` are constant-time shifts into the packed byte.

use std::cell::{Cell, UnsafeCell};
use crate::types::Tid;

pub struct BitmapTable {
    column_count: Cell<usize>,
    row_count: Cell<usize>,
    row_bytes: Cell<usize>,
    data: UnsafeCell<Vec<u8>>,
}

impl BitmapTable {
    pub fn new() -> Self {
        Self::with_column_hint(8)
    }

    pub fn with_column_hint(columns: usize) -> Self {
        let row_bytes = columns.div_ceil(8).max(1);
        Self {
            column_count: Cell::new(0),
            row_count: Cell::new(0),
            row_bytes: Cell::new(row_bytes),
            data: UnsafeCell::new(Vec::new()),
        }
    }

    pub fn column_count(&self) -> usize {
        self.column_count.get()
    }

    pub fn row_count(&self) -> usize {
        self.row_count.get()
    }

    /// Bytes per packed row.
    pub fn row_size(&self) -> usize {
        self.row_bytes.get()
    }

    /// Appends a zeroed column and returns its index.
    pub fn add_column(&self) -> usize {
        let column = self.column_count.get();
        if column == self.row_bytes.get() * 8 {
            self.widen();
        }
        self.column_count.set(column + 1);
        column
    }

    /// Appends a column initialised from an existing one, row by row.
    ///
    /// Used when a branch is born: the child's visibility column starts as a
    /// copy of its parent's.
    pub fn add_column_copy_of(&self, src: usize) -> usize {
        let column = self.add_column();
        for tid in 0..self.row_count.get() as Tid {
            if self.get(tid, src) {
                self.set(tid, column, true);
            }
        }
        column
    }

    /// Appends one zeroed row.
    pub fn add_row(&self) {
        let row_bytes = self.row_bytes.get();
        unsafe {
            let data = &mut *self.data.get();
            data.resize(data.len() + row_bytes, 0);
        }
        self.row_count.set(self.row_count.get() + 1);
    }

    pub fn get(&self, tid: Tid, column: usize) -> bool {
        debug_assert!(column < self.column_count.get());
        debug_assert!((tid as usize) < self.row_count.get());
        let byte = tid as usize * self.row_bytes.get() + (column >> 3);
        let bit = column & 7;
        unsafe {
            let data = &*self.data.get();
            (data[byte] >> bit) & 1 != 0
        }
    }

    pub fn set(&self, tid: Tid, column: usize, value: bool) {
        debug_assert!(column < self.column_count.get());
        debug_assert!((tid as usize) < self.row_count.get());
        let byte = tid as usize * self.row_bytes.get() + (column >> 3);
        let bit = column & 7;
        unsafe {
            let data = &mut *self.data.get();
            if value {
                data[byte] |= 1 << bit;
            } else {
                data[byte] &= !(1 << bit);
            }
        }
    }

    /// Doubles the row stride, repacking existing rows.
    fn widen(&self) {
        let old_bytes = self.row_bytes.get();
        let new_bytes = old_bytes * 2;
        let rows = self.row_count.get();
        unsafe {
            let data = &mut *self.data.get();
            let mut wider = vec![0u8; rows * new_bytes];
            for row in 0..rows {
                wider[row * new_bytes..row * new_bytes + old_bytes]
                    .copy_from_slice(&data[row * old_bytes..(row + 1) * old_bytes]);
            }
            *data = wider;
        }
        self.row_bytes.set(new_bytes);
    }
}

impl Default for BitmapTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BitmapTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitmapTable")
            .field("columns", &self.column_count.get())
            .field("rows", &self.row_count.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_single_bits() {
        let bm = BitmapTable::new();
        let c0 = bm.add_column();
        let c1 = bm.add_column();
        bm.add_row();
        bm.add_row();
        bm.set(0, c1, true);
        bm.set(1, c0, true);
        assert!(!bm.get(0, c0));
        assert!(bm.get(0, c1));
        assert!(bm.get(1, c0));
        assert!(!bm.get(1, c1));
        bm.set(0, c1, false);
        assert!(!bm.get(0, c1));
    }

    #[test]
    fn widening_preserves_existing_bits() {
        let bm = BitmapTable::with_column_hint(1);
        for _ in 0..8 {
            bm.add_column();
        }
        for _ in 0..4 {
            bm.add_row();
        }
        bm.set(2, 7, true);
        bm.set(3, 0, true);
        let wide = bm.add_column(); // forces the row stride to double
        assert_eq!(wide, 8);
        assert!(bm.get(2, 7));
        assert!(bm.get(3, 0));
        assert!(!bm.get(2, wide));
        bm.set(2, wide, true);
        assert!(bm.get(2, wide));
    }

    #[test]
    fn column_copy_mirrors_source() {
        let bm = BitmapTable::new();
        let parent = bm.add_column();
        for _ in 0..3 {
            bm.add_row();
        }
        bm.set(0, parent, true);
        bm.set(2, parent, true);
        let child = bm.add_column_copy_of(parent);
        assert!(bm.get(0, child));
        assert!(!bm.get(1, child));
        assert!(bm.get(2, child));
        // diverging the child leaves the parent untouched
        bm.set(0, child, false);
        assert!(bm.get(0, parent));
    }

    #[test]
    fn rows_start_zeroed() {
        let bm = BitmapTable::new();
        for _ in 0..9 {
            bm.add_column();
        }
        bm.add_row();
        for c in 0..9 {
            assert!(!bm.get(0, c));
        }
    }
}
