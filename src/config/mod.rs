//! Engine configuration.

pub mod constants;

pub use constants::{BITMAP_COLUMN_HINT, DUMP_FIELD_SEPARATOR, OPT_LOCK_RETRY_LIMIT};
