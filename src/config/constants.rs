//! # Engine Configuration Constants
//!
//! Centralizes tunables whose values interact, so related limits stay in one
//! place.
//!
//! ```text
//! OPT_LOCK_RETRY_LIMIT (64)
//!       Spin attempts on a contended version-entry lock before the
//!       statement fails with Retry. Statements are retried wholesale,
//!       so the bound stays small.
//!
//! FIRST_COLUMN_CHUNK_SLOTS (64, fixed in storage::vector)
//!       First chunk size of every column vector; each further chunk
//!       doubles. Changing it changes nothing semantically, only the
//!       allocation cadence.
//!
//! BITMAP_COLUMN_HINT (8)
//!       Initial packed-row width of the bitmap tables, in bits. Rows
//!       widen automatically past it.
//! ```

/// Bounded spin attempts on a contended version-entry lock.
pub const OPT_LOCK_RETRY_LIMIT: usize = 64;

/// Initial bit width hint for null / branch-visibility bitmap rows.
pub const BITMAP_COLUMN_HINT: usize = 8;

/// Default field separator of the table dump format.
pub const DUMP_FIELD_SEPARATOR: char = '|';
