//! A raw-mode line editor: prompt rendering, in-line editing and history
//! recall.

use std::io::{self, Write};
use std::path::PathBuf;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::{self, Color, SetForegroundColor},
    terminal,
};
use tracing::warn;

const NAME: &str = env!("CARGO_PKG_NAME");

/// What a single readline round produced.
pub enum Input {
    Line(String),
    /// Ctrl+C: drop whatever is being typed.
    Interrupted,
    /// Ctrl+D: leave the shell.
    Eof,
}

pub struct Prompt {
    history: Vec<String>,
    history_path: Option<PathBuf>,
    history_index: usize,
    /// The line being edited and the cursor offset within it.
    line: String,
    at: usize,
}

impl Prompt {
    pub fn new() -> Prompt {
        let history_path = super::history::default_path(NAME);
        let history = history_path
            .as_deref()
            .map(super::history::load)
            .unwrap_or_default();
        let history_index = history.len();

        Prompt {
            history,
            history_path,
            history_index,
            line: String::new(),
            at: 0,
        }
    }

    /// Records a finished statement in the in-memory and on-disk history.
    pub fn remember(&mut self, statement: &str) {
        if statement.trim().is_empty() {
            return;
        }
        self.history.push(statement.replace('\n', " "));
        self.history_index = self.history.len();
        if let Some(path) = &self.history_path {
            if let Err(e) = super::history::append(path, statement) {
                warn!("Failed to save history: {}", e);
            }
        }
    }

    fn prompt_text(continuation: bool) -> String {
        if continuation {
            format!("{}-> ", " ".repeat(NAME.len() - 1))
        } else {
            format!("{}> ", NAME)
        }
    }

    fn render(&self, continuation: bool) -> io::Result<()> {
        let prompt = Self::prompt_text(continuation);
        execute!(
            io::stdout(),
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::SetAttribute(style::Attribute::Bold),
            SetForegroundColor(Color::Green),
            style::Print(&prompt),
            style::SetAttribute(style::Attribute::Reset),
            style::Print(&self.line),
            cursor::MoveToColumn((prompt.len() + self.at) as u16),
        )?;
        io::stdout().flush()
    }

    /// Reads one line with editing and history. The caller decides what the
    /// line means; unfinished statements just come back for another round
    /// with `continuation` set.
    pub fn readline(&mut self, continuation: bool) -> io::Result<Input> {
        self.line.clear();
        self.at = 0;
        self.render(continuation)?;

        loop {
            let Event::Key(KeyEvent {
                code, modifiers, ..
            }) = event::read()?
            else {
                continue;
            };

            match (code, modifiers) {
                (KeyCode::Enter, _) => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(Input::Line(std::mem::take(&mut self.line)));
                }
                (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(Input::Interrupted);
                }
                (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(Input::Eof);
                }
                (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                    self.line.insert(self.at, c);
                    self.at += c.len_utf8();
                }
                (KeyCode::Backspace, _) if self.at > 0 => {
                    self.at -= self.prev_char_len();
                    self.line.remove(self.at);
                }
                (KeyCode::Left, _) if self.at > 0 => self.at -= self.prev_char_len(),
                (KeyCode::Right, _) if self.at < self.line.len() => {
                    self.at += self.next_char_len()
                }
                (KeyCode::Home, _) => self.at = 0,
                (KeyCode::End, _) => self.at = self.line.len(),
                (KeyCode::Up, _) if self.history_index > 0 => {
                    self.history_index -= 1;
                    self.recall();
                }
                (KeyCode::Down, _) if self.history_index < self.history.len() => {
                    self.history_index += 1;
                    self.recall();
                }
                _ => continue,
            }
            self.render(continuation)?;
        }
    }

    fn prev_char_len(&self) -> usize {
        self.line[..self.at]
            .chars()
            .next_back()
            .map_or(1, char::len_utf8)
    }

    fn next_char_len(&self) -> usize {
        self.line[self.at..].chars().next().map_or(1, char::len_utf8)
    }

    fn recall(&mut self) {
        self.line = self
            .history
            .get(self.history_index)
            .cloned()
            .unwrap_or_default();
        self.at = self.line.len();
    }
}
