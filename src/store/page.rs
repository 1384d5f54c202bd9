//! Pages: fixed-size blocks of cell slots with a small typed header.

use std::fmt;

use crate::errors::Error;
use crate::store::cell::Cell;
use crate::store::values::{self, Tuple};
use crate::store::PageNo;

/// kind (1) + reserved (1) + cell count (2) + next (4) + prev (4) + left (4).
pub const PAGE_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Free,
    Branch,
    Leaf,
    Overflow,
}

impl PageKind {
    fn from_u8(value: u8) -> Option<PageKind> {
        match value {
            0 => Some(PageKind::Free),
            1 => Some(PageKind::Branch),
            2 => Some(PageKind::Leaf),
            3 => Some(PageKind::Overflow),
            _ => None,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PageKind::Free => 0,
            PageKind::Branch => 1,
            PageKind::Leaf => 2,
            PageKind::Overflow => 3,
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PageKind::Free => "free",
            PageKind::Branch => "branch",
            PageKind::Leaf => "leaf",
            PageKind::Overflow => "overflow",
        };
        write!(f, "{}", name)
    }
}

/// A single page, materialized as a short-lived owning value. The pager
/// hands these out and writes them back; nothing holds one across calls.
///
/// `next`/`prev` chain sibling leaves in key order. `left` is the leftmost
/// child of a branch. All three are `0` where they do not apply.
#[derive(Debug, Clone)]
pub struct Page {
    pub page_no: PageNo,
    pub kind: PageKind,
    pub next: PageNo,
    pub prev: PageNo,
    pub left: PageNo,
    pub cells: Vec<Cell>,
    page_size: usize,
    cell_size: usize,
}

impl Page {
    pub fn new(page_size: usize, cell_size: usize) -> Page {
        Page {
            page_no: 0,
            kind: PageKind::Free,
            next: 0,
            prev: 0,
            left: 0,
            cells: Vec::with_capacity((page_size - PAGE_HEADER_SIZE) / cell_size),
            page_size,
            cell_size,
        }
    }

    /// How many cell slots fit in this page.
    pub fn capacity(&self) -> usize {
        (self.page_size - PAGE_HEADER_SIZE) / self.cell_size
    }

    /// Decodes a page from exactly `page_size` bytes.
    pub fn read_from(&mut self, buf: &[u8]) -> Result<(), Error> {
        debug_assert_eq!(buf.len(), self.page_size);
        self.kind = PageKind::from_u8(buf[0])
            .ok_or_else(|| err!(CorruptPage, "unknown page kind {}", buf[0]))?;
        let count = u16::from_be_bytes(buf[2..4].try_into().unwrap()) as usize;
        self.next = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        self.prev = u32::from_be_bytes(buf[8..12].try_into().unwrap());
        self.left = u32::from_be_bytes(buf[12..16].try_into().unwrap());

        if count > self.capacity() {
            return Err(err!(
                CorruptPage,
                "cell count {} exceeds the page capacity of {}",
                count,
                self.capacity()
            ));
        }

        self.cells.clear();
        for i in 0..count {
            let at = PAGE_HEADER_SIZE + i * self.cell_size;
            self.cells
                .push(Cell::read_from(&buf[at..at + self.cell_size], self.cell_size)?);
        }
        Ok(())
    }

    /// Encodes the page into exactly `page_size` bytes.
    pub fn write_to(&self) -> Result<Vec<u8>, Error> {
        if self.cells.len() > self.capacity() {
            return Err(err!(
                CorruptPage,
                "cell count {} exceeds the page capacity of {}",
                self.cells.len(),
                self.capacity()
            ));
        }
        let mut buf = Vec::with_capacity(self.page_size);
        buf.push(self.kind.as_u8());
        buf.push(0); // reserved
        buf.extend_from_slice(&(self.cells.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.next.to_be_bytes());
        buf.extend_from_slice(&self.prev.to_be_bytes());
        buf.extend_from_slice(&self.left.to_be_bytes());
        for cell in &self.cells {
            cell.write_to(&mut buf, self.cell_size)?;
        }
        buf.resize(self.page_size, 0);
        Ok(buf)
    }

    /// Inserts a cell at its sorted position. The page is not persisted; the
    /// caller decides when to write it back.
    pub fn insert(&mut self, cell: Cell) -> Result<(), Error> {
        let i = self.position(cell.key());
        if i < self.cells.len() && self.cells[i].key() == cell.key() {
            return Err(Error::DuplicateKey);
        }
        self.cells.insert(i, cell);
        Ok(())
    }

    /// Would one more cell push the page past capacity?
    pub fn will_overflow(&self) -> bool {
        self.cells.len() + 1 > self.capacity()
    }

    /// First index whose key is not less than `key`.
    fn position(&self, key: &Tuple) -> usize {
        self.cells
            .partition_point(|c| values::compare(c.key(), key).is_lt())
    }

    /// Merges `cell` into the sorted cells, erroring on an equal key.
    fn merged(&self, cell: Cell) -> Result<Vec<Cell>, Error> {
        let i = self.position(cell.key());
        if i < self.cells.len() && self.cells[i].key() == cell.key() {
            return Err(Error::DuplicateKey);
        }
        let mut cells = self.cells.clone();
        cells.insert(i, cell);
        Ok(cells)
    }

    /// Inserts into a full leaf by splitting it down the middle. `self`
    /// keeps the lower half; the returned right sibling (same kind, no page
    /// number yet) takes the upper half. The separator for the parent is the
    /// right page's first key.
    pub fn insert_split_leaf(&mut self, cell: Cell) -> Result<Page, Error> {
        let mut cells = self.merged(cell)?;
        let upper = cells.split_off(cells.len() / 2);
        self.cells = cells;

        let mut right = Page::new(self.page_size, self.cell_size);
        right.kind = self.kind;
        right.cells = upper;
        Ok(right)
    }

    /// Inserts into a full branch by splitting around the middle cell, which
    /// is promoted: its key is returned for the grandparent and its subtree
    /// becomes the right page's leftmost child.
    pub fn insert_split_branch(&mut self, cell: Cell) -> Result<(Page, Tuple), Error> {
        let mut cells = self.merged(cell)?;
        let mut upper = cells.split_off(cells.len() / 2);
        self.cells = cells;

        let middle = upper.remove(0);
        let mut right = Page::new(self.page_size, self.cell_size);
        right.kind = self.kind;
        right.left = middle.payload.right;
        right.cells = upper;
        Ok((right, middle.payload.key))
    }

    /// Which child of this branch covers `key`: the rightmost cell whose key
    /// is not less than `key`, or the leftmost child below every separator.
    pub fn child(&self, key: &Tuple) -> PageNo {
        let i = self
            .cells
            .partition_point(|c| values::compare(c.key(), key).is_le());
        if i == 0 {
            self.left
        } else {
            self.cells[i - 1].payload.right
        }
    }
}
