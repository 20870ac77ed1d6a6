//! Inner (router) nodes
//!
//! Inner page layout (after the 13-byte common header):
//! - bytes 13..21: left (u64) - child holding keys smaller than every
//!   separator in the entry array
//! - bytes 21..:   entry array, 12 bytes per entry:
//!   - bytes 0..2: keyoff (u16) - offset of the separator within the page
//!   - bytes 2..4: keylen (u16)
//!   - bytes 4..12: child (u64) - subtree holding keys greater than the
//!     previous separator and up to this one
//!
//! Separator bytes are packed downward from the end of the page, exactly
//! like leaf keys. Unlike a leaf split, an inner split promotes its
//! separator out of both halves.

use crate::storage::key::KeyComparator;
use crate::storage::node::{
    self, read_u16, read_u64, write_u16, write_u64, NodeKind, NENTRIES_OFFSET, NEXTOFF_OFFSET,
};
use crate::storage::PAGE_SIZE;

/// Byte offset of the leftmost-child pointer within an inner page
pub const LEFT_OFFSET: usize = 13;
/// Byte offset of the first entry within an inner page
pub const ENTRIES_OFFSET: usize = 21;
/// Size of one inner entry in bytes
pub const ENTRY_SIZE: usize = 12;

fn entry_off(pos: usize) -> usize {
    ENTRIES_OFFSET + pos * ENTRY_SIZE
}

fn write_entry(page: &mut [u8], pos: usize, keyoff: u16, keylen: u16, child: u64) {
    let off = entry_off(pos);
    write_u16(page, off, keyoff);
    write_u16(page, off + 2, keylen);
    write_u64(page, off + 4, child);
}

/// Read-only view of an inner page
pub struct InnerView<'a> {
    page: &'a [u8],
}

impl<'a> InnerView<'a> {
    pub fn new(page: &'a [u8]) -> Self {
        debug_assert_eq!(page.len(), PAGE_SIZE);
        InnerView { page }
    }

    pub fn nentries(&self) -> usize {
        node::nentries(self.page)
    }

    pub fn nextoff(&self) -> usize {
        read_u16(self.page, NEXTOFF_OFFSET) as usize
    }

    pub fn parent(&self) -> u64 {
        node::parent(self.page)
    }

    pub fn left(&self) -> u64 {
        read_u64(self.page, LEFT_OFFSET)
    }

    pub fn keyoff(&self, pos: usize) -> usize {
        read_u16(self.page, entry_off(pos)) as usize
    }

    pub fn keylen(&self, pos: usize) -> usize {
        read_u16(self.page, entry_off(pos) + 2) as usize
    }

    pub fn child(&self, pos: usize) -> u64 {
        read_u64(self.page, entry_off(pos) + 4)
    }

    pub fn key(&self, pos: usize) -> &'a [u8] {
        let off = self.keyoff(pos);
        &self.page[off..off + self.keylen(pos)]
    }

    /// Bytes left between the end of the entry array and the key area
    pub fn available(&self) -> usize {
        self.nextoff()
            .saturating_sub(ENTRIES_OFFSET + self.nentries() * ENTRY_SIZE)
    }

    /// Binary search over the separators, same contract as the leaf search
    pub fn search<C: KeyComparator>(&self, key: &[u8], comp: &C) -> (bool, usize) {
        let mut lo = 0;
        let mut hi = self.nentries();

        while lo < hi {
            let mid = (lo + hi) / 2;
            match comp.compare(key, self.key(mid)) {
                std::cmp::Ordering::Less => hi = mid,
                std::cmp::Ordering::Equal => return (true, mid),
                std::cmp::Ordering::Greater => lo = mid + 1,
            }
        }

        (false, lo)
    }

    /// Child to descend into for `key`, given a search result
    pub fn descend(&self, found: bool, pos: usize) -> u64 {
        if found {
            self.child(pos)
        } else if pos > 0 {
            self.child(pos - 1)
        } else {
            self.left()
        }
    }
}

/// Mutable view of an inner page
pub struct InnerMut<'a> {
    page: &'a mut [u8],
}

impl<'a> InnerMut<'a> {
    pub fn new(page: &'a mut [u8]) -> Self {
        debug_assert_eq!(page.len(), PAGE_SIZE);
        InnerMut { page }
    }

    pub fn view(&self) -> InnerView<'_> {
        InnerView { page: self.page }
    }

    /// Write an empty inner node into the page
    pub fn init(&mut self, parent: u64, left: u64) {
        node::init_header(self.page, NodeKind::Inner, parent);
        write_u64(self.page, LEFT_OFFSET, left);
    }

    pub fn set_left(&mut self, left: u64) {
        write_u64(self.page, LEFT_OFFSET, left);
    }

    pub fn set_parent(&mut self, parent: u64) {
        node::set_parent(self.page, parent);
    }

    pub fn set_child(&mut self, pos: usize, child: u64) {
        write_u64(self.page, entry_off(pos) + 4, child);
    }

    /// Insert at a known sorted position. False iff the entry does not fit.
    pub fn add_at(&mut self, key: &[u8], child: u64, pos: usize) -> bool {
        if ENTRY_SIZE + key.len() > self.view().available() {
            return false;
        }

        let nentries = self.view().nentries();
        let nextoff = self.view().nextoff() - key.len();
        self.page[nextoff..nextoff + key.len()].copy_from_slice(key);
        write_u16(self.page, NEXTOFF_OFFSET, nextoff as u16);

        if pos < nentries {
            self.page
                .copy_within(entry_off(pos)..entry_off(nentries), entry_off(pos + 1));
        }

        write_entry(self.page, pos, nextoff as u16, key.len() as u16, child);
        write_u16(self.page, NENTRIES_OFFSET, (nentries + 1) as u16);

        true
    }

    /// Insert or overwrite. A separator match just redirects its child.
    pub fn add<C: KeyComparator>(&mut self, key: &[u8], child: u64, comp: &C) -> bool {
        let (found, pos) = self.view().search(key, comp);
        if found {
            self.set_child(pos, child);
            true
        } else {
            self.add_at(key, child, pos)
        }
    }

    /// Split a full inner node, inserting the pending (key, child) pair and
    /// designating the separator promoted to the parent.
    ///
    /// The promoted separator's bytes are written to `upkey` and its
    /// length returned; it is removed from both halves. `right.left` is
    /// set to the child immediately left of the first right-resident
    /// separator.
    pub fn split(
        &mut self,
        right: &mut InnerMut<'_>,
        pos: usize,
        key: &[u8],
        child: u64,
        upkey: &mut [u8],
    ) -> usize {
        let mid = self.view().nentries() / 2;

        if pos > mid {
            // The pending pair lands right of the promoted separator
            // entries[mid]
            let mid_keyoff = self.view().keyoff(mid);
            let mid_keylen = self.view().keylen(mid);
            let mid_child = self.view().child(mid);

            self.fill_right_with_insert(right, mid + 1, pos - (mid + 1), key, child);
            right.set_left(mid_child);

            upkey[..mid_keylen].copy_from_slice(&self.page[mid_keyoff..mid_keyoff + mid_keylen]);
            self.defrag();
            mid_keylen
        } else if pos == mid {
            // The pending pair itself is promoted
            self.fill_right(right, mid);
            right.set_left(child);

            upkey[..key.len()].copy_from_slice(key);
            self.defrag();
            key.len()
        } else {
            // Promoted separator is entries[mid - 1]; the pending pair goes
            // into self during the compaction pass
            self.fill_right(right, mid);
            let promoted_child = self.view().child(mid - 1);
            right.set_left(promoted_child);

            self.defrag_with_insert_dropping(mid - 1, pos, key, child, upkey)
        }
    }

    /// Move entries[start..] plus the pending pair (at right-local `ins`)
    /// into `right`.
    fn fill_right_with_insert(
        &mut self,
        right: &mut InnerMut<'_>,
        start: usize,
        ins: usize,
        key: &[u8],
        child: u64,
    ) {
        let nentries = self.view().nentries();
        let n = nentries - start + 1;

        let mut off = PAGE_SIZE;
        let mut src = nentries;
        let mut dest = n;
        while dest > 0 {
            dest -= 1;
            if dest == ins {
                off -= key.len();
                right.page[off..off + key.len()].copy_from_slice(key);
                write_entry(right.page, dest, off as u16, key.len() as u16, child);
            } else {
                src -= 1;
                let len = self.view().keylen(src);
                let koff = self.view().keyoff(src);
                let src_child = self.view().child(src);
                off -= len;
                right.page[off..off + len].copy_from_slice(&self.page[koff..koff + len]);
                write_entry(right.page, dest, off as u16, len as u16, src_child);
            }
        }

        self.finish_split(right, off, n, nentries - n);
    }

    /// Move entries[start..] into `right`.
    fn fill_right(&mut self, right: &mut InnerMut<'_>, start: usize) {
        let nentries = self.view().nentries();
        let n = nentries - start;

        let mut off = PAGE_SIZE;
        for dest in (0..n).rev() {
            let src = start + dest;
            let len = self.view().keylen(src);
            let koff = self.view().keyoff(src);
            let src_child = self.view().child(src);
            off -= len;
            right.page[off..off + len].copy_from_slice(&self.page[koff..koff + len]);
            write_entry(right.page, dest, off as u16, len as u16, src_child);
        }

        self.finish_split(right, off, n, nentries - n);
    }

    fn finish_split(
        &mut self,
        right: &mut InnerMut<'_>,
        right_nextoff: usize,
        right_nentries: usize,
        remaining: usize,
    ) {
        right.page[node::KIND_OFFSET] = NodeKind::Inner as u8;
        node::set_parent(right.page, self.view().parent());
        write_u16(right.page, NEXTOFF_OFFSET, right_nextoff as u16);
        write_u16(right.page, NENTRIES_OFFSET, right_nentries as u16);

        write_u16(self.page, NENTRIES_OFFSET, remaining as u16);
    }

    /// Compact the separator area against the page end.
    pub fn defrag(&mut self) {
        let nentries = self.view().nentries();
        let mut scratch = [0u8; PAGE_SIZE];

        let mut off = PAGE_SIZE;
        for pos in (0..nentries).rev() {
            let len = self.view().keylen(pos);
            let koff = self.view().keyoff(pos);
            off -= len;
            scratch[off..off + len].copy_from_slice(&self.page[koff..koff + len]);
            write_u16(self.page, entry_off(pos), off as u16);
        }

        write_u16(self.page, NEXTOFF_OFFSET, off as u16);
        self.page[off..].copy_from_slice(&scratch[off..]);
    }

    /// Compact while dropping the entry at `drop_pos` (its key goes to
    /// `upkey`) and inserting the pending pair at `pos`. The entry count
    /// is unchanged: one out, one in.
    fn defrag_with_insert_dropping(
        &mut self,
        drop_pos: usize,
        pos: usize,
        key: &[u8],
        child: u64,
        upkey: &mut [u8],
    ) -> usize {
        debug_assert!(pos <= drop_pos);
        let nentries = self.view().nentries();
        debug_assert_eq!(drop_pos, nentries - 1);

        let drop_keyoff = self.view().keyoff(drop_pos);
        let drop_keylen = self.view().keylen(drop_pos);

        let mut scratch = [0u8; PAGE_SIZE];
        let mut off = PAGE_SIZE;
        let mut src = nentries - 1;
        let mut dest = nentries;
        while dest > 0 {
            dest -= 1;
            if dest == pos {
                off -= key.len();
                scratch[off..off + key.len()].copy_from_slice(key);
                write_entry(self.page, dest, off as u16, key.len() as u16, child);
            } else {
                src -= 1;
                let len = self.view().keylen(src);
                let koff = self.view().keyoff(src);
                let src_child = self.view().child(src);
                off -= len;
                scratch[off..off + len].copy_from_slice(&self.page[koff..koff + len]);
                write_entry(self.page, dest, off as u16, len as u16, src_child);
            }
        }

        // The dropped separator's bytes are still intact in the old key
        // area; copy them out before the compacted image lands
        upkey[..drop_keylen].copy_from_slice(&self.page[drop_keyoff..drop_keyoff + drop_keylen]);

        write_u16(self.page, NEXTOFF_OFFSET, off as u16);
        self.page[off..].copy_from_slice(&scratch[off..]);

        drop_keylen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::key::BytewiseComparator;
    use crate::storage::KEY_MAX_LEN;

    const COMP: BytewiseComparator = BytewiseComparator;

    fn inner_with(keys: &[(&[u8], u64)], left: u64) -> Vec<u8> {
        let mut page = vec![0u8; PAGE_SIZE];
        let mut inner = InnerMut::new(&mut page);
        inner.init(0, left);
        for (key, child) in keys {
            assert!(inner.add(key, *child, &COMP));
        }
        page
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(LEFT_OFFSET, 13);
        assert_eq!(ENTRIES_OFFSET, 21);
        assert_eq!(ENTRY_SIZE, 12);
        assert_eq!(entry_off(0), 21);
        assert_eq!(entry_off(3), 57);
    }

    #[test]
    fn test_descend_rule() {
        let page = inner_with(&[(b"200", 150), (b"400", 350)], 50);
        let view = InnerView::new(&page);

        // Smaller than every separator: leftmost child
        let (found, pos) = view.search(b"100", &COMP);
        assert_eq!(view.descend(found, pos), 50);
        // Exact match: that entry's child
        let (found, pos) = view.search(b"200", &COMP);
        assert_eq!(view.descend(found, pos), 150);
        // Between separators: the child left of the insertion point
        let (found, pos) = view.search(b"300", &COMP);
        assert_eq!(view.descend(found, pos), 150);
        // Greater than every separator: last child
        let (found, pos) = view.search(b"500", &COMP);
        assert_eq!(view.descend(found, pos), 350);
    }

    #[test]
    fn test_add_overwrites_child_on_match() {
        let mut page = inner_with(&[(b"200", 150)], 50);
        let mut inner = InnerMut::new(&mut page);

        assert!(inner.add(b"200", 999, &COMP));
        assert_eq!(inner.view().nentries(), 1);
        assert_eq!(inner.view().child(0), 999);
    }

    // The five-entry fixture of the split case analysis: separators
    // 100..500 with children 50..550 interleaved.
    fn five_entry_fixture() -> Vec<u8> {
        inner_with(
            &[
                (b"100", 150),
                (b"200", 250),
                (b"300", 350),
                (b"400", 450),
                (b"500", 550),
            ],
            50,
        )
    }

    fn collect(view: &InnerView<'_>) -> Vec<(Vec<u8>, u64)> {
        (0..view.nentries())
            .map(|i| (view.key(i).to_vec(), view.child(i)))
            .collect()
    }

    #[test]
    fn test_split_new_pair_goes_right() {
        // pos > mid: insert (375, 380); 300 is promoted
        let mut left_page = five_entry_fixture();
        let mut right_page = vec![0u8; PAGE_SIZE];
        let mut left = InnerMut::new(&mut left_page);
        let mut right = InnerMut::new(&mut right_page);
        right.init(0, 0);

        let (found, pos) = left.view().search(b"375", &COMP);
        assert!(!found);
        assert_eq!(pos, 3);

        let mut upkey = [0u8; KEY_MAX_LEN];
        let uplen = left.split(&mut right, pos, b"375", 380, &mut upkey);

        assert_eq!(&upkey[..uplen], b"300");
        assert_eq!(
            collect(&left.view()),
            vec![(b"100".to_vec(), 150), (b"200".to_vec(), 250)]
        );
        assert_eq!(left.view().left(), 50);
        assert_eq!(
            collect(&right.view()),
            vec![
                (b"375".to_vec(), 380),
                (b"400".to_vec(), 450),
                (b"500".to_vec(), 550)
            ]
        );
        assert_eq!(right.view().left(), 350);
    }

    #[test]
    fn test_split_new_pair_promoted() {
        // pos == mid: insert (275, 280); the new pair goes to the parent
        let mut left_page = five_entry_fixture();
        let mut right_page = vec![0u8; PAGE_SIZE];
        let mut left = InnerMut::new(&mut left_page);
        let mut right = InnerMut::new(&mut right_page);
        right.init(0, 0);

        let (found, pos) = left.view().search(b"275", &COMP);
        assert!(!found);
        assert_eq!(pos, 2);

        let mut upkey = [0u8; KEY_MAX_LEN];
        let uplen = left.split(&mut right, pos, b"275", 280, &mut upkey);

        assert_eq!(&upkey[..uplen], b"275");
        assert_eq!(
            collect(&left.view()),
            vec![(b"100".to_vec(), 150), (b"200".to_vec(), 250)]
        );
        assert_eq!(
            collect(&right.view()),
            vec![
                (b"300".to_vec(), 350),
                (b"400".to_vec(), 450),
                (b"500".to_vec(), 550)
            ]
        );
        assert_eq!(right.view().left(), 280);
    }

    #[test]
    fn test_split_new_pair_goes_left() {
        // pos < mid: insert (175, 180); 200 is promoted
        let mut left_page = five_entry_fixture();
        let mut right_page = vec![0u8; PAGE_SIZE];
        let mut left = InnerMut::new(&mut left_page);
        let mut right = InnerMut::new(&mut right_page);
        right.init(0, 0);

        let (found, pos) = left.view().search(b"175", &COMP);
        assert!(!found);
        assert_eq!(pos, 1);

        let mut upkey = [0u8; KEY_MAX_LEN];
        let uplen = left.split(&mut right, pos, b"175", 180, &mut upkey);

        assert_eq!(&upkey[..uplen], b"200");
        assert_eq!(
            collect(&left.view()),
            vec![(b"100".to_vec(), 150), (b"175".to_vec(), 180)]
        );
        assert_eq!(left.view().left(), 50);
        assert_eq!(
            collect(&right.view()),
            vec![
                (b"300".to_vec(), 350),
                (b"400".to_vec(), 450),
                (b"500".to_vec(), 550)
            ]
        );
        assert_eq!(right.view().left(), 250);
    }

    #[test]
    fn test_split_even_count() {
        // Four entries, insert between the middle pair
        let mut left_page = inner_with(
            &[(b"100", 150), (b"200", 250), (b"300", 350), (b"400", 450)],
            50,
        );
        let mut right_page = vec![0u8; PAGE_SIZE];
        let mut left = InnerMut::new(&mut left_page);
        let mut right = InnerMut::new(&mut right_page);
        right.init(0, 0);

        let (_, pos) = left.view().search(b"275", &COMP);
        assert_eq!(pos, 2);

        let mut upkey = [0u8; KEY_MAX_LEN];
        let uplen = left.split(&mut right, pos, b"275", 280, &mut upkey);

        assert_eq!(&upkey[..uplen], b"275");
        assert_eq!(
            collect(&left.view()),
            vec![(b"100".to_vec(), 150), (b"200".to_vec(), 250)]
        );
        assert_eq!(
            collect(&right.view()),
            vec![(b"300".to_vec(), 350), (b"400".to_vec(), 450)]
        );
        assert_eq!(right.view().left(), 280);
    }

    #[test]
    fn test_defrag_compacts_separators() {
        let mut page = inner_with(&[(b"aaa", 1), (b"bbb", 2), (b"ccc", 3)], 0);
        let mut inner = InnerMut::new(&mut page);
        inner.defrag();

        let view = inner.view();
        assert_eq!(view.nextoff(), PAGE_SIZE - 9);
        assert_eq!(view.key(0), b"aaa");
        assert_eq!(view.key(1), b"bbb");
        assert_eq!(view.key(2), b"ccc");
        let mut expected = PAGE_SIZE;
        for i in (0..3).rev() {
            expected -= view.keylen(i);
            assert_eq!(view.keyoff(i), expected);
        }
    }
}
