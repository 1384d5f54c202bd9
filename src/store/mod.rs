//! The disk-resident B+tree storage engine.
//!
//! The engine is a stack of small layers. The [`pager`] maps page numbers to
//! file offsets and owns the database header. The [`codec`], [`cell`] and
//! [`page`] modules define the on-disk binary format. The [`btree`] module
//! implements search, ordered iteration and insert-with-split on top of the
//! pager, keying everything by typed [`values::Tuple`]s.

pub mod btree;
pub mod cell;
pub mod codec;
pub mod page;
pub mod pager;
pub mod values;

/// A page number. `0` means "no page" and is never a valid target of
/// [`pager::Pager::get`]; the header occupies the zeroth page slot.
pub type PageNo = u32;

pub use btree::{BTree, TreeIter};
pub use cell::{Cell, Payload};
pub use page::{Page, PageKind};
pub use pager::{Header, Pager, DEFAULT_CELL_SIZE, DEFAULT_PAGE_SIZE};
pub use values::{compare, Tuple, Value};
