//! Interactive shell: rustyline REPL, dot commands, table formatting.

pub mod commands;
pub mod repl;
pub mod table;

pub use repl::Repl;
