//! branchdb shell.
//!
//! ```text
//! branchdb            interactive REPL
//! branchdb FILE.sql   run a script, then exit
//! ```
//!
//! Exits 0 on success, non-zero on any uncaught error.

use branchdb::cli::Repl;
use branchdb::Database;
use eyre::WrapErr;

fn main() -> eyre::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let db = Database::new();

    match args.as_slice() {
        [] => Repl::new(db).run(),
        [script] => run_script(&db, script),
        _ => {
            eprintln!("usage: branchdb [SCRIPT.sql]");
            std::process::exit(2);
        }
    }
}

/// Runs every `;`-terminated statement of a script through the print sink.
fn run_script(db: &Database, path: &str) -> eyre::Result<()> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("cannot read '{path}'"))?;
    let mut stdout = std::io::stdout().lock();
    for statement in text.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        let sql = format!("{statement};");
        db.execute_print(&sql, &mut stdout)
            .wrap_err_with(|| format!("statement failed: {sql}"))?;
    }
    Ok(())
}
