//! String pool backing the long-string column slots.
//!
//! Long (`> 15` byte) string payloads are interned here once and referenced
//! by raw pointer from the 16-byte column slots and packed tuple images. The
//! pool is append-only and owned by the table, so interned pointers stay
//! valid until the table is dropped.

use bumpalo::Bump;
use std::cell::RefCell;

pub struct TextPool {
    arena: RefCell<Bump>,
}

impl TextPool {
    pub fn new() -> Self {
        Self {
            arena: RefCell::new(Bump::new()),
        }
    }

    /// Copies `s` into the pool and returns the stable interned slice.
    pub fn intern(&self, s: &str) -> &str {
        let arena = self.arena.borrow();
        let interned: &str = arena.alloc_str(s);
        // Safety: the Bump never frees or moves allocations, and the pool is
        // append-only for the lifetime of the owning table; extending the
        // borrow to &self is sound.
        unsafe { std::mem::transmute::<&str, &str>(interned) }
    }

    /// Bytes currently held by the pool.
    pub fn allocated_bytes(&self) -> usize {
        self.arena.borrow().allocated_bytes()
    }
}

impl Default for TextPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPool")
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_strings_are_stable() {
        let pool = TextPool::new();
        let a = pool.intern("the first rather long string payload");
        let a_ptr = a.as_ptr();
        for i in 0..1000 {
            pool.intern(&format!("filler payload number {i}"));
        }
        assert_eq!(a_ptr, a.as_ptr());
        assert_eq!(a, "the first rather long string payload");
    }
}
