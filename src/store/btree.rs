//! The B+tree engine: search, ordered iteration and insert-with-split over
//! the pager.
//!
//! The tree never rewrites more than it has to. An insert descends to a
//! leaf; pages split on the way back up by allocating a fresh right sibling
//! at the end of the file and rewriting the split page in place. The root
//! page number a caller holds is therefore a value, not a slot: `insert`
//! returns the possibly-new root and the caller is responsible for storing
//! it (the header for the catalog, the catalog entry for a table).

use tracing::debug;

use crate::errors::Error;
use crate::store::cell::Cell;
use crate::store::page::{Page, PageKind};
use crate::store::pager::Pager;
use crate::store::values::{self, Tuple};
use crate::store::PageNo;

pub struct BTree<'p> {
    pager: &'p mut Pager,
}

impl<'p> BTree<'p> {
    pub fn new(pager: &'p mut Pager) -> BTree<'p> {
        BTree { pager }
    }

    /// Allocates an empty leaf to serve as the root of a new tree.
    pub fn create_root(&mut self) -> Result<PageNo, Error> {
        let mut root = self.pager.new_page();
        root.kind = PageKind::Leaf;
        self.pager.create_page(&mut root)
    }

    /// Looks up the value stored under exactly `key`.
    pub fn search(&mut self, root: PageNo, key: &Tuple) -> Result<Tuple, Error> {
        let mut iter = self.iterator(root, key);
        if !iter.next() {
            return Err(iter.take_err().unwrap_or(Error::NotFound));
        }
        if iter.key() != key {
            return Err(Error::NotFound);
        }
        Ok(iter.value().clone())
    }

    /// Positions a cursor so that the next cell produced is the smallest key
    /// not less than `key`. Descent errors are carried inside the cursor,
    /// which then yields nothing.
    pub fn iterator(&mut self, root: PageNo, key: &Tuple) -> TreeIter<'_> {
        let mut page_no = root;
        loop {
            let page = match self.pager.get(page_no) {
                Ok(p) => p,
                Err(e) => return TreeIter::broken(&mut *self.pager, e),
            };
            match page.kind {
                PageKind::Leaf => {
                    let at = page
                        .cells
                        .partition_point(|c| values::compare(c.key(), key).is_lt());
                    return TreeIter {
                        pager: &mut *self.pager,
                        page: Some(page),
                        index: at as isize - 1,
                        err: None,
                    };
                }
                PageKind::Branch => {
                    page_no = page.child(key);
                    if page_no == 0 {
                        let err = err!(
                            CorruptPage,
                            "branch page {} has no leftmost child",
                            page.page_no
                        );
                        return TreeIter::broken(&mut *self.pager, err);
                    }
                }
                kind => {
                    let err = err!(CorruptPage, "cannot descend a {} page", kind);
                    return TreeIter::broken(&mut *self.pager, err);
                }
            }
        }
    }

    /// Inserts `key -> value`, splitting pages as needed, and returns the
    /// root of the resulting tree. The root only changes when a split
    /// propagates all the way up and a new one is promoted.
    pub fn insert(&mut self, root: PageNo, key: Tuple, value: Tuple) -> Result<PageNo, Error> {
        let mut page = self.pager.get(root)?;
        let promoted = self.insert_into(&mut page, Cell::leaf(key, value))?;

        if let Some(cell) = promoted {
            let mut new_root = self.pager.new_page();
            new_root.kind = PageKind::Branch;
            new_root.left = root;
            new_root.cells.push(cell);
            self.pager.create_page(&mut new_root)?;
            debug!(
                old_root = root,
                new_root = new_root.page_no,
                "Promoted a new root."
            );
            return Ok(new_root.page_no);
        }
        Ok(root)
    }

    fn insert_into(&mut self, page: &mut Page, cell: Cell) -> Result<Option<Cell>, Error> {
        match page.kind {
            PageKind::Leaf => {
                if !page.will_overflow() {
                    page.insert(cell)?;
                    self.pager.update(page)?;
                    return Ok(None);
                }

                // Split, persist both halves, then stitch the sibling chain.
                let mut right = page.insert_split_leaf(cell)?;
                right.next = page.next;
                right.prev = page.page_no;
                self.pager.create_page(&mut right)?;
                page.next = right.page_no;
                self.pager.update(page)?;
                if right.next != 0 {
                    let mut successor = self.pager.get(right.next)?;
                    successor.prev = right.page_no;
                    self.pager.update(&successor)?;
                }
                debug!(
                    left = page.page_no,
                    right = right.page_no,
                    "Split a leaf page."
                );
                Ok(Some(Cell::branch(
                    right.cells[0].key().clone(),
                    right.page_no,
                )))
            }
            PageKind::Branch => {
                let child_no = page.child(cell.key());
                if child_no == 0 {
                    return Err(err!(
                        CorruptPage,
                        "branch page {} has no leftmost child",
                        page.page_no
                    ));
                }
                let mut child = self.pager.get(child_no)?;
                let promoted = match self.insert_into(&mut child, cell)? {
                    Some(c) => c,
                    None => return Ok(None),
                };

                if !page.will_overflow() {
                    page.insert(promoted)?;
                    self.pager.update(page)?;
                    return Ok(None);
                }

                let (mut right, middle_key) = page.insert_split_branch(promoted)?;
                self.pager.create_page(&mut right)?;
                self.pager.update(page)?;
                debug!(
                    left = page.page_no,
                    right = right.page_no,
                    "Split a branch page."
                );
                Ok(Some(Cell::branch(middle_key, right.page_no)))
            }
            kind => Err(err!(CorruptPage, "cannot insert into a {} page", kind)),
        }
    }

    /// Replaces the value stored under exactly `key`, in place. Never
    /// changes the shape of the tree.
    pub fn update(&mut self, root: PageNo, key: &Tuple, value: Tuple) -> Result<(), Error> {
        let mut page_no = root;
        loop {
            let mut page = self.pager.get(page_no)?;
            match page.kind {
                PageKind::Leaf => {
                    let at = page
                        .cells
                        .partition_point(|c| values::compare(c.key(), key).is_lt());
                    if at >= page.cells.len() || page.cells[at].key() != key {
                        return Err(Error::NotFound);
                    }
                    page.cells[at].payload.value = value;
                    return self.pager.update(&page);
                }
                PageKind::Branch => {
                    page_no = page.child(key);
                    if page_no == 0 {
                        return Err(err!(
                            CorruptPage,
                            "branch page {} has no leftmost child",
                            page.page_no
                        ));
                    }
                }
                kind => return Err(err!(CorruptPage, "cannot descend a {} page", kind)),
            }
        }
    }
}

/// A forward cursor over the leaf chain. `next` must return `true` before
/// `key`/`value` are read.
pub struct TreeIter<'p> {
    pager: &'p mut Pager,
    page: Option<Page>,
    index: isize,
    err: Option<Error>,
}

impl<'p> TreeIter<'p> {
    fn broken(pager: &'p mut Pager, err: Error) -> TreeIter<'p> {
        TreeIter {
            pager,
            page: None,
            index: -1,
            err: Some(err),
        }
    }

    /// Steps to the next cell, following the sibling chain across leaves.
    pub fn next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        let page = match &self.page {
            Some(p) => p,
            None => return false,
        };

        if self.index + 1 >= page.cells.len() as isize {
            if page.next == 0 {
                return false;
            }
            match self.pager.get(page.next) {
                Ok(p) => {
                    self.page = Some(p);
                    self.index = 0;
                }
                Err(e) => {
                    self.err = Some(e);
                    return false;
                }
            }
        } else {
            self.index += 1;
        }

        self.page
            .as_ref()
            .map_or(false, |p| (self.index as usize) < p.cells.len())
    }

    pub fn key(&self) -> &Tuple {
        self.current().key()
    }

    pub fn value(&self) -> &Tuple {
        self.current().value()
    }

    fn current(&self) -> &Cell {
        &self.page.as_ref().expect("no current cell").cells[self.index as usize]
    }

    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    pub fn take_err(&mut self) -> Option<Error> {
        self.err.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::values::Value;

    fn key(n: i64) -> Tuple {
        vec![Value::Int(n)]
    }

    fn val(n: i64) -> Tuple {
        vec![Value::Text(n.to_string())]
    }

    fn small_pager() -> (tempfile::TempDir, Pager) {
        let dir = tempfile::tempdir().unwrap();
        let pager = Pager::create(&dir.path().join("test.db"), 128, 32).unwrap();
        (dir, pager)
    }

    fn leaf(pager: &mut Pager, keys: &[i64], next: PageNo, prev: PageNo) -> PageNo {
        let mut page = pager.new_page();
        page.kind = PageKind::Leaf;
        page.next = next;
        page.prev = prev;
        page.cells = keys.iter().map(|&n| Cell::leaf(key(n), val(n))).collect();
        pager.create_page(&mut page).unwrap()
    }

    fn branch(pager: &mut Pager, left: PageNo, cells: &[(i64, PageNo)]) -> PageNo {
        let mut page = pager.new_page();
        page.kind = PageKind::Branch;
        page.left = left;
        page.cells = cells
            .iter()
            .map(|&(n, right)| Cell::branch(key(n), right))
            .collect();
        pager.create_page(&mut page).unwrap()
    }

    fn scan(pager: &mut Pager, root: PageNo) -> Vec<i64> {
        let mut tree = BTree::new(pager);
        let mut iter = tree.iterator(root, &Tuple::new());
        let mut keys = Vec::new();
        while iter.next() {
            match &iter.key()[0] {
                Value::Int(n) => keys.push(*n),
                other => panic!("unexpected key {:?}", other),
            }
        }
        assert!(iter.err().is_none(), "{:?}", iter.err());
        keys
    }

    /// The three-level fixture the iterator and search tests walk:
    /// leaves [1,4] [9,10] [11,12] [13,15] [16,20,25] under two branches
    /// and a branch root.
    fn three_level_fixture(pager: &mut Pager) -> PageNo {
        let l1 = leaf(pager, &[1, 4], 2, 0);
        let l2 = leaf(pager, &[9, 10], 3, l1);
        let l3 = leaf(pager, &[11, 12], 4, l2);
        let l4 = leaf(pager, &[13, 15], 5, l3);
        let l5 = leaf(pager, &[16, 20, 25], 0, l4);
        let i1 = branch(pager, l1, &[(9, l2), (11, l3)]);
        let i2 = branch(pager, l4, &[(16, l5)]);
        branch(pager, i1, &[(13, i2)])
    }

    #[test]
    fn iterate_the_whole_tree() {
        let (_dir, mut pager) = small_pager();
        let root = three_level_fixture(&mut pager);

        let mut tree = BTree::new(&mut pager);
        let mut iter = tree.iterator(root, &key(1));
        let mut seen = Vec::new();
        while iter.next() {
            seen.push((iter.key().clone(), iter.value().clone()));
        }
        assert!(iter.err().is_none());

        let expected: Vec<i64> = vec![1, 4, 9, 10, 11, 12, 13, 15, 16, 20, 25];
        assert_eq!(seen.len(), expected.len());
        for (n, (k, v)) in expected.iter().zip(&seen) {
            assert_eq!(k, &key(*n));
            assert_eq!(v, &val(*n));
        }
    }

    #[test]
    fn iterate_from_the_middle() {
        let (_dir, mut pager) = small_pager();
        let root = three_level_fixture(&mut pager);

        let mut tree = BTree::new(&mut pager);
        // 14 is absent; the cursor lands just before 15.
        let mut iter = tree.iterator(root, &key(14));
        assert!(iter.next());
        assert_eq!(iter.key(), &key(15));
        assert!(iter.next());
        assert_eq!(iter.key(), &key(16));
    }

    #[test]
    fn search_finds_every_key_and_nothing_else() {
        let (_dir, mut pager) = small_pager();
        let root = three_level_fixture(&mut pager);

        let mut tree = BTree::new(&mut pager);
        for n in [1, 4, 9, 10, 11, 12, 13, 15, 16, 20, 25] {
            assert_eq!(tree.search(root, &key(n)).unwrap(), val(n), "key {}", n);
        }
        for n in [0, 2, 14, 26] {
            assert!(
                matches!(tree.search(root, &key(n)), Err(Error::NotFound)),
                "key {}",
                n
            );
        }
    }

    #[test]
    fn insert_into_a_leaf_with_room() {
        let (_dir, mut pager) = small_pager();
        let l1 = leaf(&mut pager, &[1, 4, 9], 2, 0);
        let l2 = leaf(&mut pager, &[16, 25], 0, l1);
        let root = branch(&mut pager, l1, &[(16, l2)]);

        let new_root = BTree::new(&mut pager)
            .insert(root, key(20), val(20))
            .unwrap();
        assert_eq!(new_root, root);

        let page = pager.get(l2).unwrap();
        let keys: Vec<_> = page.cells.iter().map(|c| c.key().clone()).collect();
        assert_eq!(keys, vec![key(16), key(20), key(25)]);
        assert_eq!(scan(&mut pager, root), vec![1, 4, 9, 16, 20, 25]);
    }

    #[test]
    fn insert_splits_a_full_leaf_and_promotes_a_separator() {
        let (_dir, mut pager) = small_pager();
        let l1 = leaf(&mut pager, &[1, 4, 9], 2, 0);
        let l2 = leaf(&mut pager, &[16, 20, 25], 0, l1);
        let root = branch(&mut pager, l1, &[(16, l2)]);

        let new_root = BTree::new(&mut pager)
            .insert(root, key(13), val(13))
            .unwrap();
        assert_eq!(new_root, root);

        // The old leaf keeps the lower half and a new sibling appears.
        let left = pager.get(l1).unwrap();
        let left_keys: Vec<_> = left.cells.iter().map(|c| c.key().clone()).collect();
        assert_eq!(left_keys, vec![key(1), key(4)]);

        let split = left.next;
        assert_ne!(split, 0);
        assert_ne!(split, l2);
        let middle = pager.get(split).unwrap();
        let middle_keys: Vec<_> = middle.cells.iter().map(|c| c.key().clone()).collect();
        assert_eq!(middle_keys, vec![key(9), key(13)]);

        // Chain: l1 <-> split <-> l2.
        assert_eq!(middle.prev, l1);
        assert_eq!(middle.next, l2);
        assert_eq!(pager.get(l2).unwrap().prev, split);

        // Root picked up the separator.
        let root_page = pager.get(root).unwrap();
        let root_keys: Vec<_> = root_page.cells.iter().map(|c| c.key().clone()).collect();
        assert_eq!(root_keys, vec![key(9), key(16)]);
        assert_eq!(root_page.cells[0].payload.right, split);

        assert_eq!(scan(&mut pager, root), vec![1, 4, 9, 13, 16, 20, 25]);
    }

    #[test]
    fn insert_promotes_a_new_root_when_the_old_one_is_full() {
        let (_dir, mut pager) = small_pager();
        let l1 = leaf(&mut pager, &[1, 4], 2, 0);
        let l2 = leaf(&mut pager, &[9, 10, 11], 3, l1);
        let l3 = leaf(&mut pager, &[13, 15], 4, l2);
        let l4 = leaf(&mut pager, &[16, 20, 25], 0, l3);
        let root = branch(&mut pager, l1, &[(9, l2), (13, l3), (16, l4)]);

        let new_root = BTree::new(&mut pager)
            .insert(root, key(12), val(12))
            .unwrap();
        assert_ne!(new_root, root);

        // The old root became the left internal branch.
        let left = pager.get(root).unwrap();
        assert_eq!(left.kind, PageKind::Branch);
        let left_keys: Vec<_> = left.cells.iter().map(|c| c.key().clone()).collect();
        assert_eq!(left_keys, vec![key(9), key(11)]);

        let top = pager.get(new_root).unwrap();
        assert_eq!(top.kind, PageKind::Branch);
        assert_eq!(top.left, root);
        assert_eq!(top.cells.len(), 1);
        assert_eq!(top.cells[0].key(), &key(13));

        // The promoted sibling covers the upper separators.
        let sibling = pager.get(top.cells[0].payload.right).unwrap();
        assert_eq!(sibling.kind, PageKind::Branch);
        assert_eq!(sibling.left, l3);
        let sibling_keys: Vec<_> = sibling.cells.iter().map(|c| c.key().clone()).collect();
        assert_eq!(sibling_keys, vec![key(16)]);

        assert_eq!(
            scan(&mut pager, new_root),
            vec![1, 4, 9, 10, 11, 12, 13, 15, 16, 20, 25]
        );
    }

    #[test]
    fn duplicate_keys_are_rejected_without_damage() {
        let (_dir, mut pager) = small_pager();
        let mut root = BTree::new(&mut pager).create_root().unwrap();
        for n in 1..=7 {
            root = BTree::new(&mut pager)
                .insert(root, key(n), val(n))
                .unwrap();
        }

        let before = scan(&mut pager, root);
        // A duplicate fails whether the target leaf has room (7) or is
        // full enough to split (any key after the tree fills up).
        for n in [1, 4, 7] {
            assert!(matches!(
                BTree::new(&mut pager).insert(root, key(n), val(99)),
                Err(Error::DuplicateKey)
            ));
        }
        assert_eq!(scan(&mut pager, root), before);
        assert_eq!(
            BTree::new(&mut pager).search(root, &key(4)).unwrap(),
            val(4)
        );
    }

    #[test]
    fn empty_root_accepts_the_first_insert() {
        let (_dir, mut pager) = small_pager();
        let root = BTree::new(&mut pager).create_root().unwrap();

        assert_eq!(scan(&mut pager, root), Vec::<i64>::new());
        let new_root = BTree::new(&mut pager).insert(root, key(1), val(1)).unwrap();
        assert_eq!(new_root, root);
        assert_eq!(scan(&mut pager, root), vec![1]);
    }

    #[test]
    fn update_replaces_a_value_in_place() {
        let (_dir, mut pager) = small_pager();
        let mut root = BTree::new(&mut pager).create_root().unwrap();
        for n in 1..=9 {
            root = BTree::new(&mut pager)
                .insert(root, key(n), val(n))
                .unwrap();
        }

        BTree::new(&mut pager)
            .update(root, &key(5), val(500))
            .unwrap();
        assert_eq!(
            BTree::new(&mut pager).search(root, &key(5)).unwrap(),
            val(500)
        );
        assert_eq!(scan(&mut pager, root), (1..=9).collect::<Vec<_>>());

        assert!(matches!(
            BTree::new(&mut pager).update(root, &key(42), val(0)),
            Err(Error::NotFound)
        ));
    }

    fn insert_all(pager: &mut Pager, keys: &[i64]) -> PageNo {
        let mut root = BTree::new(pager).create_root().unwrap();
        for &n in keys {
            root = BTree::new(pager).insert(root, key(n), val(n)).unwrap();
        }
        root
    }

    fn check_tree(pager: &mut Pager, root: PageNo, count: i64) {
        let expected: Vec<i64> = (1..=count).collect();
        assert_eq!(scan(pager, root), expected);
        let mut tree = BTree::new(pager);
        for n in 1..=count {
            assert_eq!(tree.search(root, &key(n)).unwrap(), val(n), "key {}", n);
        }
        assert!(matches!(
            tree.search(root, &key(count + 1)),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn insert_order_does_not_matter() {
        const N: i64 = 100;

        let ascending: Vec<i64> = (1..=N).collect();
        let descending: Vec<i64> = (1..=N).rev().collect();
        // A fixed congruential shuffle keeps the case reproducible.
        let mut shuffled = ascending.clone();
        let mut state: u64 = 12345;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state >> 33) as usize % (i + 1));
        }

        for order in [ascending, descending, shuffled] {
            let (_dir, mut pager) = small_pager();
            let root = insert_all(&mut pager, &order);
            check_tree(&mut pager, root, N);
        }
    }

    #[test]
    fn leaf_chain_stays_linked_in_both_directions() {
        let (_dir, mut pager) = small_pager();
        let root = insert_all(&mut pager, &(1..=50).collect::<Vec<_>>());

        // Walk down the left edge to the first leaf.
        let mut page = pager.get(root).unwrap();
        while page.kind == PageKind::Branch {
            page = pager.get(page.left).unwrap();
        }

        let mut prev: PageNo = 0;
        let mut last_key: Option<Tuple> = None;
        loop {
            assert_eq!(page.prev, prev, "prev link of page {}", page.page_no);
            assert!(!page.cells.is_empty());
            for cell in &page.cells {
                if let Some(last) = &last_key {
                    assert!(values::compare(last, cell.key()).is_lt());
                }
                last_key = Some(cell.key().clone());
            }
            if page.next == 0 {
                break;
            }
            prev = page.page_no;
            page = pager.get(page.next).unwrap();
        }
    }

    #[test]
    fn file_stays_page_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut pager = Pager::create(&path, 128, 32).unwrap();
        insert_all(&mut pager, &(1..=30).collect::<Vec<_>>());

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len % 128, 0);
    }
}
