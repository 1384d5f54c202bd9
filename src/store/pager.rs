//! The pager: whole-page I/O over a single file, plus the database header.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::errors::Error;
use crate::store::cell::CELL_HEADER_SIZE;
use crate::store::page::{Page, PAGE_HEADER_SIZE};
use crate::store::PageNo;

/// Follows the PNG file signature rationale: a non-ASCII lead byte, a name,
/// CR LF to catch line-ending translation, ctrl-Z, LF.
pub const SIGNATURE: [u8; 8] = [0x89, b'1', b'D', b'B', b'\r', b'\n', 0x26, b'\n'];

pub const HEADER_SIZE: usize = 8 + 4 + 4 + 4;

pub const DEFAULT_PAGE_SIZE: u32 = 4096;
pub const DEFAULT_CELL_SIZE: u32 = 256;

/// The database header, stored on page 0 and padded to a full page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub page_size: u32,
    pub cell_size: u32,
    /// Root page of the catalog tree; `0` until the first table is defined.
    pub root: PageNo,
}

impl Header {
    /// Encodes the header padded to `page_size` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.page_size as usize);
        buf.extend_from_slice(&SIGNATURE);
        buf.extend_from_slice(&self.page_size.to_be_bytes());
        buf.extend_from_slice(&self.cell_size.to_be_bytes());
        buf.extend_from_slice(&self.root.to_be_bytes());
        buf.resize(self.page_size as usize, 0);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Header, Error> {
        if buf.len() < HEADER_SIZE {
            return Err(err!(InvalidFile, "truncated header of {} bytes", buf.len()));
        }
        if buf[..8] != SIGNATURE {
            return Err(err!(InvalidFile, "signature mismatch"));
        }
        let header = Header {
            page_size: u32::from_be_bytes(buf[8..12].try_into().unwrap()),
            cell_size: u32::from_be_bytes(buf[12..16].try_into().unwrap()),
            root: u32::from_be_bytes(buf[16..20].try_into().unwrap()),
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.cell_size as usize <= CELL_HEADER_SIZE {
            return Err(err!(InvalidFile, "cell size {} is too small", self.cell_size));
        }
        if (self.page_size as usize) < PAGE_HEADER_SIZE + self.cell_size as usize {
            return Err(err!(
                InvalidFile,
                "page size {} cannot hold a single {}-byte cell",
                self.page_size,
                self.cell_size
            ));
        }
        Ok(())
    }
}

/// Owns the file handle and maps page numbers to byte offsets. Pages are
/// append-allocated and never freed, so a page number is stable for the
/// lifetime of the file.
pub struct Pager {
    file: File,
    pub header: Header,
}

impl Pager {
    /// Creates a new database file and writes the header page.
    pub fn create(path: &Path, page_size: u32, cell_size: u32) -> Result<Pager, Error> {
        let header = Header {
            page_size,
            cell_size,
            root: 0,
        };
        header.validate()?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        let mut pager = Pager { file, header };
        pager.update_header()?;
        info!(path = %path.display(), page_size, cell_size, "Created database file.");
        Ok(pager)
    }

    /// Opens an existing database file and validates its header.
    pub fn open(path: &Path) -> Result<Pager, Error> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut buf = [0u8; HEADER_SIZE];
        let got = read_full(&mut file, &mut buf)?;
        let header = Header::decode(&buf[..got])?;

        info!(
            path = %path.display(),
            page_size = header.page_size,
            root = header.root,
            "Opened database file."
        );
        Ok(Pager { file, header })
    }

    pub fn page_size(&self) -> usize {
        self.header.page_size as usize
    }

    pub fn cell_size(&self) -> usize {
        self.header.cell_size as usize
    }

    /// A blank in-memory page with this file's geometry, not yet allocated.
    pub fn new_page(&self) -> Page {
        Page::new(self.page_size(), self.cell_size())
    }

    /// Reads exactly one page.
    pub fn get(&mut self, page_no: PageNo) -> Result<Page, Error> {
        if page_no == 0 {
            return Err(Error::InvalidPageNo(0));
        }
        let offset = page_no as u64 * self.header.page_size as u64;
        if offset >= self.file.metadata()?.len() {
            return Err(Error::InvalidPageNo(page_no));
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; self.page_size()];
        let got = read_full(&mut self.file, &mut buf)?;
        if got < buf.len() {
            return Err(Error::ShortRead {
                expected: buf.len(),
                got,
            });
        }

        let mut page = self.new_page();
        page.page_no = page_no;
        page.read_from(&buf)?;
        Ok(page)
    }

    /// Writes a page back to its slot.
    pub fn update(&mut self, page: &Page) -> Result<(), Error> {
        let buf = page.write_to()?;
        let offset = page.page_no as u64 * self.header.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.write_exact(&buf)?;
        debug!(page_no = page.page_no, kind = %page.kind, cells = page.cells.len(), "Updated page.");
        Ok(())
    }

    /// Appends a page at the end of the file and assigns its page number
    /// from the resulting offset.
    pub fn create_page(&mut self, page: &mut Page) -> Result<PageNo, Error> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        let buf = page.write_to()?;
        self.write_exact(&buf)?;
        page.page_no = (offset / self.header.page_size as u64) as PageNo;
        debug!(page_no = page.page_no, kind = %page.kind, "Allocated page.");
        Ok(page.page_no)
    }

    /// Rewrites page 0 from the in-memory header.
    pub fn update_header(&mut self) -> Result<(), Error> {
        self.file.seek(SeekFrom::Start(0))?;
        self.write_exact(&self.header.encode())?;
        debug!(root = self.header.root, "Updated header.");
        Ok(())
    }

    /// Flushes and releases the file. Dropping the pager releases it too;
    /// this form surfaces the final I/O error instead of swallowing it.
    pub fn close(self) -> Result<(), Error> {
        self.file.sync_all()?;
        Ok(())
    }

    fn write_exact(&mut self, buf: &[u8]) -> Result<(), Error> {
        let n = self.file.write(buf)?;
        if n != buf.len() {
            return Err(Error::ShortWrite {
                expected: buf.len(),
                got: n,
            });
        }
        Ok(())
    }
}

/// Reads until the buffer is full or the file ends, returning the byte
/// count. Lets callers tell a short page apart from a plain I/O failure.
fn read_full(file: &mut File, buf: &mut [u8]) -> Result<usize, Error> {
    let mut got = 0;
    while got < buf.len() {
        let n = file.read(&mut buf[got..])?;
        if n == 0 {
            break;
        }
        got += n;
    }
    Ok(got)
}
