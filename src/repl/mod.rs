//! The interactive shell. Statements accumulate across lines until the
//! parser stops reporting them incomplete, so a trailing semicolon is what
//! actually ends a statement, not the end of a line.

pub mod history;
pub mod prompt;

use std::io::{self, Write};
use std::time::Instant;

use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal,
};
use tracing::info;

use crate::database::Database;
use crate::errors::Error;
use crate::exec::Rows;
use crate::store::values::Value;
use prompt::{Input, Prompt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: &str = r#"
Statements end with ; and may span lines. Type 'help' for help.
"#;

const HELP: &str = r#"btdb understands:
  CREATE TABLE name (col TYPE, ..., PRIMARY KEY (cols));
  INSERT INTO name [(cols)] VALUES (v, ...), ...;
  SELECT * FROM name;
Shell commands: help, exit (also quit, \q). Ctrl+C clears the current line.
"#;

/// Runs the shell until the user leaves. Raw mode is always released, even
/// when the loop errors out.
pub fn start(db: &mut Database) -> Result<(), Error> {
    terminal::enable_raw_mode()?;
    let result = Console::new(db).run();
    terminal::disable_raw_mode()?;
    result
}

struct Console<'a> {
    db: &'a mut Database,
    prompt: Prompt,
}

impl<'a> Console<'a> {
    fn new(db: &'a mut Database) -> Console<'a> {
        Console {
            db,
            prompt: Prompt::new(),
        }
    }

    fn run(&mut self) -> Result<(), Error> {
        echo(&format!("Welcome to btdb {}.", VERSION));
        echo(BANNER.trim());
        info!(path = %self.db.path().display(), "Starting shell.");

        let mut statement = String::new();
        loop {
            let continuation = !statement.is_empty();
            let line = match self.prompt.readline(continuation)? {
                Input::Eof => {
                    echo("Bye");
                    return Ok(());
                }
                Input::Interrupted => {
                    if statement.is_empty() {
                        echo("Bye");
                        return Ok(());
                    }
                    statement.clear();
                    continue;
                }
                Input::Line(line) => line,
            };

            if statement.is_empty() {
                match line.trim() {
                    "" => continue,
                    "exit" | "quit" | "\\q" => {
                        echo("Bye");
                        return Ok(());
                    }
                    "help" | "\\h" | "?" => {
                        echo(HELP.trim());
                        continue;
                    }
                    _ => {}
                }
            }

            if !statement.is_empty() {
                statement.push('\n');
            }
            statement.push_str(&line);

            let start = Instant::now();
            match self.db.query(&statement) {
                // Keep reading lines until the statement terminates.
                Err(Error::Incomplete) => continue,
                Err(e) => {
                    self.prompt.remember(&statement);
                    statement.clear();
                    echo_error(&format!("{}", e));
                }
                Ok(mut rows) => {
                    self.prompt.remember(&statement);
                    statement.clear();
                    let elapsed = start.elapsed().as_secs_f32();
                    render_result(&mut rows, elapsed);
                }
            }
        }
    }
}

fn render_result(rows: &mut Rows, elapsed: f32) {
    if rows.columns().is_empty() {
        echo(&format!(
            "Query OK, {} row{} affected ({:.2} sec)",
            rows.affected(),
            plural(rows.affected()),
            elapsed
        ));
        return;
    }

    let headers: Vec<String> = rows.columns().to_vec();
    let mut table = Vec::new();
    let mut row = vec![Value::Int(0); headers.len()];
    while rows.next(&mut row).is_some() {
        table.push(row.iter().map(Value::to_string).collect::<Vec<_>>());
    }

    let count = table.len();
    echo(&build_table(&headers, &table));
    echo(&format!(
        "{} row{} in set ({:.2} sec)",
        count,
        plural(count),
        elapsed
    ));
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Prints through the raw-mode terminal, translating line endings.
fn echo(text: &str) {
    let mut stdout = io::stdout();
    for line in text.lines() {
        let _ = execute!(stdout, Print(line), Print("\r\n"));
    }
    let _ = stdout.flush();
}

fn echo_error(text: &str) {
    let mut stdout = io::stdout();
    let _ = execute!(stdout, SetForegroundColor(Color::Red));
    echo(text);
    let _ = execute!(stdout, ResetColor);
}

/// Renders an ASCII table with a header separator.
fn build_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let border = {
        let mut b = String::from("+");
        for width in &widths {
            b.push_str(&"-".repeat(width + 2));
            b.push('+');
        }
        b
    };

    let format_row = |cells: &[String]| {
        let mut line = String::from("|");
        for (i, cell) in cells.iter().enumerate() {
            line.push_str(&format!(" {:<width$} |", cell, width = widths[i]));
        }
        line
    };

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&format_row(headers));
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out.push_str(&border);
    out
}
