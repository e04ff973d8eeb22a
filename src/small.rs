//! Small-block allocator: class lookup, page subdivision, and the intrusive
//! free-list walk.
//!
//! A free block's first four bytes double as a link cell holding the
//! page-relative offset of the next free block, so no side table is needed
//! to track which blocks on a page are free.

use crate::error::{AllocError, FreeError};
use crate::page::{PageRole, PageTable, LINK_END};
use crate::size_class::ClassTable;

const LINK_SIZE: usize = core::mem::size_of::<u32>();

fn write_link(arena: &mut [u8], page_base: usize, offset: u32, value: u32) {
    let at = page_base + offset as usize;
    arena[at..at + LINK_SIZE].copy_from_slice(&value.to_ne_bytes());
}

fn read_link(arena: &[u8], page_base: usize, offset: u32) -> u32 {
    let at = page_base + offset as usize;
    u32::from_ne_bytes(arena[at..at + LINK_SIZE].try_into().expect("4-byte slice"))
}

/// Allocate one block of `classes.size_of(class_index)` bytes, subdividing a
/// fresh page first if the class has no partial page.
pub(crate) fn alloc<const PAGE_COUNT: usize, const CLASS_COUNT: usize>(
    arena: &mut [u8],
    table: &mut PageTable<PAGE_COUNT, CLASS_COUNT>,
    classes: &ClassTable<CLASS_COUNT>,
    page_bytes: usize,
    class_index: usize,
) -> Result<usize, AllocError> {
    let class_size = classes.size_of(class_index);

    let page = match table.partial_page(class_index) {
        Some(p) => p,
        None => {
            let p = match table.take_free_page() {
                Some(p) => p,
                None => {
                    log::warn!("small allocator: no free page left for class {class_size}");
                    return Err(AllocError::OutOfMemory);
                }
            };
            subdivide(arena, table, p, class_index, class_size, page_bytes);
            log::trace!("page {p} subdivided into class {class_size} blocks");
            p
        }
    };

    let page_base = page * page_bytes;
    let (free_head, free_count) = match table.descriptor(page).role {
        PageRole::SmallBlockPage { free_head, free_count, .. } => (free_head, free_count),
        _ => unreachable!("partial_page/take_free_page only ever hand back a SmallBlockPage"),
    };

    let next = read_link(arena, page_base, free_head);
    let result_offset = page_base + free_head as usize;
    let new_count = free_count - 1;

    if let PageRole::SmallBlockPage { free_head: fh, free_count: fc, .. } = &mut table.descriptor_mut(page).role {
        *fh = next;
        *fc = new_count;
    }
    if new_count == 0 {
        table.remove_from_class_bucket(class_index, page);
    }

    Ok(result_offset)
}

fn subdivide<const PAGE_COUNT: usize, const CLASS_COUNT: usize>(
    arena: &mut [u8],
    table: &mut PageTable<PAGE_COUNT, CLASS_COUNT>,
    page: usize,
    class_index: usize,
    class_size: usize,
    page_bytes: usize,
) {
    let blocks_per_page = page_bytes / class_size;
    let page_base = page * page_bytes;
    for b in 0..blocks_per_page {
        let offset = (b * class_size) as u32;
        let next = if b + 1 < blocks_per_page { ((b + 1) * class_size) as u32 } else { LINK_END };
        write_link(arena, page_base, offset, next);
    }
    table.commit_subdivided(page, class_index, class_size, blocks_per_page);
}

/// Free a block at `block_offset` (an arena-absolute offset) back onto
/// `page`'s intrusive free list. LIFO: the link cell stores the previous
/// head, so the freed block becomes the new head.
pub(crate) fn free<const PAGE_COUNT: usize, const CLASS_COUNT: usize>(
    arena: &mut [u8],
    table: &mut PageTable<PAGE_COUNT, CLASS_COUNT>,
    page_bytes: usize,
    page: usize,
    block_offset: usize,
) -> Result<(), FreeError> {
    let page_base = page * page_bytes;
    let offset_in_page = (block_offset - page_base) as u32;

    let (class_size, class_index, free_head, free_count) = match table.descriptor(page).role {
        PageRole::SmallBlockPage { class_size, class_index, free_head, free_count } => {
            (class_size, class_index, free_head, free_count)
        }
        _ => return Err(FreeError::InvalidAddress),
    };
    let well_aligned = offset_in_page as usize % class_size == 0 && (offset_in_page as usize) < page_bytes;
    debug_assert!(well_aligned, "free: offset is not the start of a block on this page (foreign pointer)");
    if !well_aligned {
        return Err(FreeError::InvalidAddress);
    }

    write_link(arena, page_base, offset_in_page, free_head);

    let was_full = free_count == 0;
    let new_count = free_count + 1;
    if let PageRole::SmallBlockPage { free_head: fh, free_count: fc, .. } = &mut table.descriptor_mut(page).role {
        *fh = offset_in_page;
        *fc = new_count;
    }
    if was_full {
        table.insert_into_class_bucket(class_index, page);
    }

    let blocks_per_page = page_bytes / class_size;
    if new_count == blocks_per_page {
        table.remove_from_class_bucket(class_index, page);
        table.promote_to_free(page);
        log::trace!("page {page} fully freed, promoted back to Free");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageTable;

    const PAGE_BYTES: usize = 256;

    #[test]
    fn first_alloc_subdivides_then_returns_head() {
        let mut arena = [0u8; 256 * 4];
        let mut table: PageTable<4, 4> = PageTable::new();
        let classes: ClassTable<4> = ClassTable::new(16);

        let off = alloc(&mut arena, &mut table, &classes, PAGE_BYTES, 0).unwrap();
        assert_eq!(off, 0);
        match table.descriptor(0).role {
            PageRole::SmallBlockPage { free_count, free_head, .. } => {
                assert_eq!(free_count, 15);
                assert_eq!(free_head, 16);
            }
            _ => panic!("expected SmallBlockPage"),
        }
    }

    #[test]
    fn free_then_alloc_reuses_lifo_head() {
        let mut arena = [0u8; 256 * 4];
        let mut table: PageTable<4, 4> = PageTable::new();
        let classes: ClassTable<4> = ClassTable::new(16);

        let a = alloc(&mut arena, &mut table, &classes, PAGE_BYTES, 0).unwrap();
        let _b = alloc(&mut arena, &mut table, &classes, PAGE_BYTES, 0).unwrap();
        free(&mut arena, &mut table, PAGE_BYTES, 0, a).unwrap();
        let c = alloc(&mut arena, &mut table, &classes, PAGE_BYTES, 0).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn freeing_every_block_promotes_page_to_free() {
        let mut arena = [0u8; 256 * 4];
        let mut table: PageTable<4, 4> = PageTable::new();
        let classes: ClassTable<4> = ClassTable::new(16);

        let mut offsets = [0usize; 16];
        for o in offsets.iter_mut() {
            *o = alloc(&mut arena, &mut table, &classes, PAGE_BYTES, 0).unwrap();
        }
        for &o in offsets.iter().rev() {
            free(&mut arena, &mut table, PAGE_BYTES, 0, o).unwrap();
        }
        assert_eq!(table.descriptor(0).role, PageRole::Free);
    }

    #[test]
    fn freeing_foreign_page_role_is_invalid_address() {
        let mut arena = [0u8; 256 * 4];
        let mut table: PageTable<4, 4> = PageTable::new();
        assert_eq!(free(&mut arena, &mut table, PAGE_BYTES, 0, 0), Err(FreeError::InvalidAddress));
    }
}
