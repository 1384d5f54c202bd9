//! The database facade the shell and the pipe loop talk to.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::Error;
use crate::exec::{self, Rows};
use crate::sql;
use crate::store::pager::{Pager, DEFAULT_CELL_SIZE, DEFAULT_PAGE_SIZE};

pub struct Database {
    path: PathBuf,
    pager: Pager,
}

impl Database {
    /// Creates a new database file with the default geometry.
    pub fn create(path: &Path) -> Result<Database, Error> {
        let pager = Pager::create(path, DEFAULT_PAGE_SIZE, DEFAULT_CELL_SIZE)?;
        Ok(Database {
            path: path.to_path_buf(),
            pager,
        })
    }

    /// Opens an existing database file.
    pub fn open(path: &Path) -> Result<Database, Error> {
        let pager = Pager::open(path)?;
        Ok(Database {
            path: path.to_path_buf(),
            pager,
        })
    }

    /// Opens the file if it exists, creates it otherwise.
    pub fn open_or_create(path: &Path) -> Result<Database, Error> {
        if path.exists() {
            Database::open(path)
        } else {
            Database::create(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses and executes one statement. An unfinished statement comes
    /// back as [`Error::Incomplete`] without touching the file.
    pub fn query(&mut self, sql: &str) -> Result<Rows, Error> {
        let statement = sql::parse(sql)?;
        info!(sql, "Executing statement.");
        exec::execute(&mut self.pager, statement)
    }

    /// Flushes and releases the underlying file.
    pub fn close(self) -> Result<(), Error> {
        info!(path = %self.path.display(), "Closing database.");
        self.pager.close()
    }
}
