//! # In-Memory Columnar Store
//!
//! The storage layer keeps every table fully in memory, column at a time:
//!
//! ```text
//! Table
//! ├── columns: [(ColumnInformation, Vector)]     one Vector per SQL column
//! ├── null_indicators: BitmapTable               rows × nullable columns
//! ├── branch_bitmap: BitmapTable                 rows × branches
//! ├── version_mgmt / dangling_version_mgmt       per-row chain heads
//! ├── version_arena                              chain nodes (never freed)
//! └── text_pool                                  long string payloads
//! ```
//!
//! ## Pointer stability
//!
//! [`Vector`] and [`StableVec`] back their slots with chunked, doubling
//! allocations. A slot pointer returned by `push_back_uninit` stays valid for
//! the lifetime of the table; nothing is ever relocated or freed before the
//! table drops. This is what lets version-chain materialisation and long
//! string slots hold raw interior pointers.
//!
//! ## Single-writer discipline
//!
//! All containers here mutate through `&self` with interior mutability. The
//! engine runs one statement at a time; the version manager is the only
//! writer, and readers observe only fully initialised slots (the published
//! length is advanced after the slot bytes are written). None of these types
//! are `Sync`.

pub mod bitmap;
pub mod stable_vec;
pub mod table;
pub mod text_pool;
pub mod vector;

pub use bitmap::BitmapTable;
pub use stable_vec::StableVec;
pub use table::{ColumnInformation, NullIndicatorType, Table};
pub use text_pool::TextPool;
pub use vector::Vector;
