//! Persistent shell history, one statement per line in the home directory.
//!
//! The file itself is append-only across sessions; the trimming happens at
//! load time, so a long-lived history file costs nothing until the next
//! start.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// How many entries a session starts with. Older lines stay in the file but
/// are not offered for recall.
pub const HISTORY_CAP: usize = 500;

/// Where history lives, when a home directory can be determined. The shell
/// simply runs without persistent history otherwise.
pub fn default_path(name: &str) -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(format!(".{}_history", name)))
}

/// Loads the recall list: the newest [`HISTORY_CAP`] entries, with runs of
/// the same statement collapsed to one so arrowing up past a re-run is one
/// keystroke. An unreadable or missing file is just empty.
pub fn load(path: &Path) -> Vec<String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => return Vec::new(),
    };

    let mut entries: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || entries.last().map(String::as_str) == Some(line) {
            continue;
        }
        entries.push(line.to_string());
    }

    if entries.len() > HISTORY_CAP {
        entries.drain(..entries.len() - HISTORY_CAP);
    }
    entries
}

/// Appends one entry. Statements can span lines; they are flattened so the
/// file stays line-oriented.
pub fn append(path: &Path, entry: &str) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", entry.replace('\n', " ").trim())?;
    writer.flush()
}
