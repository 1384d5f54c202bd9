use std::fs::OpenOptions;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use btdb::database::Database;
use btdb::errors::Error;
use btdb::exec::Rows;
use btdb::repl;
use btdb::store::values::Value;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "btdb", version = VERSION, about = "Single-file B+tree SQL database.")]
struct Cli {
    /// Path to the database file. Created with default settings if missing.
    path: PathBuf,
}

fn main() -> ExitCode {
    // Log to a file: the shell owns the terminal in raw mode.
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("btdb.log")
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_env("BTDB_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut db = match Database::open_or_create(&cli.path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = if io::stdin().is_terminal() {
        repl::start(&mut db)
    } else {
        pipe(&mut db)
    };
    let result = result.and(db.close());

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::Interrupted => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// The non-interactive loop: statements from stdin, rows to stdout as
/// tab-separated lines under a column-name header.
fn pipe(db: &mut Database) -> Result<(), Error> {
    let stdin = io::stdin();
    let mut statement = String::new();

    for line in stdin.lock().lines() {
        let line = line?;
        if statement.is_empty() && line.trim().is_empty() {
            continue;
        }
        if !statement.is_empty() {
            statement.push('\n');
        }
        statement.push_str(&line);

        match db.query(&statement) {
            Err(Error::Incomplete) => continue,
            Err(e) => {
                statement.clear();
                eprintln!("Error: {}", e);
            }
            Ok(mut rows) => {
                statement.clear();
                print_rows(&mut rows)?;
            }
        }
    }

    if !statement.trim().is_empty() {
        return Err(Error::Incomplete);
    }
    Ok(())
}

fn print_rows(rows: &mut Rows) -> Result<(), Error> {
    if rows.columns().is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", rows.columns().join("\t"))?;

    let mut row = vec![Value::Int(0); rows.columns().len()];
    while rows.next(&mut row).is_some() {
        let cells: Vec<String> = row.iter().map(Value::to_string).collect();
        writeln!(stdout, "{}", cells.join("\t"))?;
    }
    Ok(())
}
