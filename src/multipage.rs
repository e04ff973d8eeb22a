//! Contiguous multi-page allocator and the multi-page half of the free path.
//!
//! A request is satisfied by the first run of consecutive free pages found
//! scanning from the lowest address; there is no coalescing of free runs
//! beyond what naturally falls out of freeing a whole run at once.

use crate::error::{AllocError, FreeError};
use crate::page::{PageRole, PageTable};

/// Allocate `page_count` contiguous pages, returning the arena-absolute byte
/// offset of the head page.
pub(crate) fn alloc<const PAGE_COUNT: usize, const CLASS_COUNT: usize>(
    table: &mut PageTable<PAGE_COUNT, CLASS_COUNT>,
    page_bytes: usize,
    page_count: usize,
) -> Result<usize, AllocError> {
    let head = table.find_consecutive_run(page_count).ok_or_else(|| {
        log::warn!("multi-page allocator: no run of {page_count} free pages available");
        AllocError::OutOfMemory
    })?;
    table.commit_multipage_run(head, page_count);
    log::trace!("pages {head}..{} committed as a {page_count}-page run", head + page_count);
    Ok(head * page_bytes)
}

/// Release the run headed by the page containing `addr`. `addr` must be the
/// head of the run; any other address in the run is rejected with
/// `InvalidAddress`.
pub(crate) fn free<const PAGE_COUNT: usize, const CLASS_COUNT: usize>(
    table: &mut PageTable<PAGE_COUNT, CLASS_COUNT>,
    page: usize,
) -> Result<(), FreeError> {
    let run_length = match table.descriptor(page).role {
        PageRole::MultiPageMember { run_length, remaining } => {
            if remaining != run_length {
                log::warn!("multi-page free: address is not the head of its run (possible mid-run free)");
                return Err(FreeError::InvalidAddress);
            }
            run_length
        }
        _ => return Err(FreeError::InvalidAddress),
    };
    table.release_multipage_run(page, run_length);
    log::trace!("run headed at page {page} ({run_length} pages) released back to Free");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageTable;

    #[test]
    fn alloc_picks_lowest_address_window() {
        let mut table: PageTable<8, 1> = PageTable::new();
        let off = alloc(&mut table, 256, 4).unwrap();
        assert_eq!(off, 0);
        match table.descriptor(0).role {
            PageRole::MultiPageMember { run_length, remaining } => {
                assert_eq!(run_length, 4);
                assert_eq!(remaining, 4);
            }
            _ => panic!("expected MultiPageMember"),
        }
        match table.descriptor(3).role {
            PageRole::MultiPageMember { remaining, .. } => assert_eq!(remaining, 1),
            _ => panic!("expected MultiPageMember"),
        }
    }

    #[test]
    fn out_of_memory_when_no_run_is_long_enough() {
        let mut table: PageTable<4, 1> = PageTable::new();
        assert!(alloc(&mut table, 256, 5).is_err());
    }

    #[test]
    fn free_releases_whole_run_back_to_free() {
        let mut table: PageTable<8, 1> = PageTable::new();
        alloc(&mut table, 256, 4).unwrap();
        free(&mut table, 0).unwrap();
        for p in 0..4 {
            assert_eq!(table.descriptor(p).role, PageRole::Free);
        }
    }

    #[test]
    fn freeing_mid_run_address_is_invalid() {
        let mut table: PageTable<8, 1> = PageTable::new();
        alloc(&mut table, 256, 4).unwrap();
        assert_eq!(free(&mut table, 2), Err(FreeError::InvalidAddress));
    }
}
