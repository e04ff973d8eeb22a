//! Page-based memory management: the page descriptor table and its two
//! cross-indexes, the free-page index and the class-to-partial-pages index.
//!
//! Each page is in exactly one role at a time. The free-page index and the
//! per-class buckets are kept in lockstep with the descriptor array so a
//! contiguous-run search only has to scan free pages, not the whole table.

use crate::util::index_set::IndexSet;

/// Sentinel marking the end of an in-page free list.
pub(crate) const LINK_END: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageRole {
    Free,
    SmallBlockPage {
        class_size: usize,
        class_index: usize,
        free_count: usize,
        free_head: u32,
    },
    MultiPageMember {
        run_length: u32,
        remaining: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageDescriptor {
    pub role: PageRole,
}

impl PageDescriptor {
    pub const fn new_free() -> Self {
        Self { role: PageRole::Free }
    }
}

/// Owns the descriptor array plus the two cross-indexes, and keeps the three
/// mutually consistent: a page appears in the free-page index iff its role
/// is `Free`, and in a class bucket iff it is a `SmallBlockPage` with at
/// least one free block.
pub(crate) struct PageTable<const PAGE_COUNT: usize, const CLASS_COUNT: usize> {
    descriptors: [PageDescriptor; PAGE_COUNT],
    free_pages: IndexSet<PAGE_COUNT>,
    class_buckets: [IndexSet<PAGE_COUNT>; CLASS_COUNT],
}

impl<const PAGE_COUNT: usize, const CLASS_COUNT: usize> PageTable<PAGE_COUNT, CLASS_COUNT> {
    pub fn new() -> Self {
        let mut free_pages = IndexSet::new();
        for p in 0..PAGE_COUNT {
            free_pages.insert_sorted(p);
        }
        Self {
            descriptors: [PageDescriptor::new_free(); PAGE_COUNT],
            free_pages,
            class_buckets: [IndexSet::new(); CLASS_COUNT],
        }
    }

    #[inline]
    pub fn descriptor(&self, page: usize) -> &PageDescriptor {
        &self.descriptors[page]
    }

    #[inline]
    pub fn descriptor_mut(&mut self, page: usize) -> &mut PageDescriptor {
        &mut self.descriptors[page]
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        PAGE_COUNT
    }

    /// The page with a free block of `class_index`, if one has a free slot.
    pub fn partial_page(&self, class_index: usize) -> Option<usize> {
        self.class_buckets[class_index].as_slice().first().copied()
    }

    /// Take any page currently in the Free role, removing it from the
    /// free-page index. Caller must immediately commit it to a new role.
    pub fn take_free_page(&mut self) -> Option<usize> {
        self.free_pages.pop_front()
    }

    /// Scan the free-page index for the lowest-address run of `k` pages
    /// whose indices are strictly consecutive (first-fit from the lowest
    /// address). Returns the head page index.
    pub fn find_consecutive_run(&self, k: usize) -> Option<usize> {
        let free = self.free_pages.as_slice();
        if k == 0 || free.is_empty() {
            return None;
        }
        let mut run_start = 0usize;
        let mut run_len = 1usize;
        for i in 1..free.len() {
            if free[i] == free[i - 1] + 1 {
                run_len += 1;
            } else {
                run_start = i;
                run_len = 1;
            }
            if run_len == k {
                return Some(free[run_start]);
            }
        }
        if run_len >= k {
            return Some(free[run_start]);
        }
        None
    }

    /// Commit `k` consecutive pages starting at `head` to a multi-page run,
    /// removing each from the free-page index.
    pub fn commit_multipage_run(&mut self, head: usize, k: usize) {
        for i in 0..k {
            let page = head + i;
            self.free_pages.remove(page);
            self.descriptors[page].role = PageRole::MultiPageMember {
                run_length: k as u32,
                remaining: (k - i) as u32,
            };
        }
    }

    /// Commit a freshly taken Free page to SmallBlockPage role for `class_size`
    /// and register it in the class bucket. The caller (`small.rs`, which owns
    /// arena access) is responsible for writing the actual free-list link
    /// bytes into the page before this is called.
    pub fn commit_subdivided(&mut self, page: usize, class_index: usize, class_size: usize, blocks_per_page: usize) {
        debug_assert!(blocks_per_page > 0);
        self.descriptors[page].role = PageRole::SmallBlockPage {
            class_size,
            class_index,
            free_count: blocks_per_page,
            free_head: 0,
        };
        self.class_buckets[class_index].push_back(page);
    }

    /// Remove `page` from its class bucket (called when its last free block
    /// is taken).
    pub fn remove_from_class_bucket(&mut self, class_index: usize, page: usize) {
        self.class_buckets[class_index].remove(page);
    }

    /// Insert `page` back into its class bucket (called when a full page
    /// gains its first free block again).
    pub fn insert_into_class_bucket(&mut self, class_index: usize, page: usize) {
        self.class_buckets[class_index].push_back(page);
    }

    /// Promote a page back to Free role, clearing SmallBlockPage state and
    /// reinserting into the free-page index.
    pub fn promote_to_free(&mut self, page: usize) {
        self.descriptors[page].role = PageRole::Free;
        self.free_pages.insert_sorted(page);
    }

    /// Release an `L`-page multi-page run back to Free role, page by page.
    pub fn release_multipage_run(&mut self, head: usize, run_length: u32) {
        for i in 0..run_length as usize {
            let page = head + i;
            self.descriptors[page].role = PageRole::Free;
            self.free_pages.insert_sorted(page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_has_all_pages_free() {
        let table: PageTable<8, 4> = PageTable::new();
        assert_eq!(table.free_pages.len(), 8);
        for p in 0..8 {
            assert_eq!(table.descriptor(p).role, PageRole::Free);
        }
    }

    #[test]
    fn find_consecutive_run_picks_lowest_address() {
        let mut table: PageTable<8, 4> = PageTable::new();
        // Take pages 0 and 1, leaving one contiguous free run [2..7].
        table.commit_multipage_run(0, 1);
        table.commit_multipage_run(1, 1);
        assert_eq!(table.find_consecutive_run(3), Some(2));
    }

    #[test]
    fn take_free_page_then_subdivide_registers_bucket() {
        let mut table: PageTable<4, 2> = PageTable::new();
        let page = table.take_free_page().unwrap();
        assert_eq!(page, 0);
        table.commit_subdivided(page, 0, 16, 16);
        assert_eq!(table.partial_page(0), Some(0));
        match table.descriptor(0).role {
            PageRole::SmallBlockPage { free_count, class_size, .. } => {
                assert_eq!(free_count, 16);
                assert_eq!(class_size, 16);
            }
            _ => panic!("expected SmallBlockPage"),
        }
    }
}
