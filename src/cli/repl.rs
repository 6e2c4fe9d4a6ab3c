//! Read-eval-print loop.
//!
//! Lines starting with `.` are dot commands and run immediately; everything
//! else accumulates until a `;` terminates the statement. The prompt flips
//! from `branchdb>` to `      ->` while a statement is open. SQL errors are
//! printed and the loop continues; `.quit` or Ctrl+D exits.

use crate::cli::commands::{CommandHandler, CommandResult};
use crate::cli::table::format_table;
use crate::database::Database;
use crate::exec::ExecuteResult;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub struct Repl {
    db: Database,
}

impl Repl {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn run(&mut self) -> eyre::Result<()> {
        let mut editor = DefaultEditor::new()?;
        let mut buffer = String::new();

        loop {
            let prompt = if buffer.is_empty() {
                "branchdb> "
            } else {
                "      -> "
            };
            match editor.readline(prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if buffer.is_empty() && CommandHandler::is_command(trimmed) {
                        editor.add_history_entry(trimmed).ok();
                        match CommandHandler::execute(trimmed, &self.db) {
                            CommandResult::Exit => return Ok(()),
                            CommandResult::Output(text) => println!("{text}"),
                            CommandResult::Error(text) => eprintln!("error: {text}"),
                            CommandResult::Continue => {}
                        }
                        continue;
                    }

                    buffer.push_str(&line);
                    buffer.push(' ');
                    if trimmed.ends_with(';') {
                        let statement = std::mem::take(&mut buffer);
                        editor.add_history_entry(statement.trim()).ok();
                        self.run_statement(statement.trim());
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    buffer.clear();
                }
                Err(ReadlineError::Eof) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Runs one statement and prints its outcome.
    pub fn run_statement(&self, sql: &str) {
        let is_query = sql.trim_start().get(..6).is_some_and(|head| {
            head.eq_ignore_ascii_case("select")
        });
        if is_query {
            match self.db.query_with_columns(sql) {
                Ok((columns, rows)) => print!("{}", format_table(&columns, &rows)),
                Err(e) => eprintln!("error: {e}"),
            }
            return;
        }
        match self.db.execute(sql) {
            Ok(ExecuteResult::RowsAffected(n)) => println!("{n} rows affected"),
            Ok(ExecuteResult::TableCreated { name }) => println!("table {name} created"),
            Ok(ExecuteResult::BranchCreated { name, id }) => {
                println!("branch {name} created (id {id})")
            }
            Ok(ExecuteResult::Rows(_)) | Ok(ExecuteResult::Printed) => {}
            Err(e) => eprintln!("error: {e}"),
        }
    }
}
