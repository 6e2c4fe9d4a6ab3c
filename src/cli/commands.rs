//! Dot commands: shell control and catalog introspection.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `.quit` / `.exit` | leave the shell |
//! | `.tables` | list tables |
//! | `.branches` | list branches |
//! | `.import FILE TABLE [BRANCH]` | load a `\|`-separated dump |
//! | `.help` | show this list |
//!
//! Commands are case-insensitive; anything unrecognized is an error, not
//! SQL.

use crate::database::Database;
use crate::types::MASTER_BRANCH_ID;
use std::fs::File;
use std::io::BufReader;

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Output(String),
    Exit,
    Continue,
    Error(String),
}

pub struct CommandHandler;

impl CommandHandler {
    pub fn is_command(input: &str) -> bool {
        input.trim().starts_with('.')
    }

    pub fn execute(input: &str, db: &Database) -> CommandResult {
        let parts: Vec<&str> = input.trim().split_whitespace().collect();
        if parts.is_empty() {
            return CommandResult::Continue;
        }
        let command = parts[0].to_lowercase();
        let args = &parts[1..];

        match command.as_str() {
            ".quit" | ".exit" | ".q" => CommandResult::Exit,
            ".help" => CommandResult::Output(
                "commands:\n\
                 \x20 .tables                      list tables\n\
                 \x20 .branches                    list branches\n\
                 \x20 .import FILE TABLE [BRANCH]  load a |-separated dump\n\
                 \x20 .quit                        exit"
                    .to_string(),
            ),
            ".tables" => {
                let names = db.table_names();
                if names.is_empty() {
                    CommandResult::Output("no tables".to_string())
                } else {
                    CommandResult::Output(names.join("\n"))
                }
            }
            ".branches" => CommandResult::Output(db.branch_names().join("\n")),
            ".import" => Self::import(db, args),
            other => CommandResult::Error(format!("unknown command '{other}'")),
        }
    }

    fn import(db: &Database, args: &[&str]) -> CommandResult {
        let (file, table) = match args {
            [file, table] | [file, table, _] => (*file, *table),
            _ => return CommandResult::Error(".import FILE TABLE [BRANCH]".to_string()),
        };
        let branch = match args.get(2) {
            None => MASTER_BRANCH_ID,
            Some(name) => match db.branch_id(name) {
                Some(id) => id,
                None => return CommandResult::Error(format!("unknown branch '{name}'")),
            },
        };
        let reader = match File::open(file) {
            Ok(f) => BufReader::new(f),
            Err(e) => return CommandResult::Error(format!("cannot open '{file}': {e}")),
        };
        match db.load_table_dump(table, branch, reader) {
            Ok(n) => CommandResult::Output(format!("loaded {n} rows into {table}")),
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dot_commands() {
        assert!(CommandHandler::is_command(".tables"));
        assert!(CommandHandler::is_command("  .quit"));
        assert!(!CommandHandler::is_command("SELECT 1;"));
    }

    #[test]
    fn quit_and_unknown() {
        let db = Database::new();
        assert_eq!(CommandHandler::execute(".quit", &db), CommandResult::Exit);
        assert!(matches!(
            CommandHandler::execute(".nope", &db),
            CommandResult::Error(_)
        ));
    }

    #[test]
    fn branches_lists_master() {
        let db = Database::new();
        assert_eq!(
            CommandHandler::execute(".branches", &db),
            CommandResult::Output("master".to_string())
        );
    }
}
