//! Diagnostic dump: a read-only walk of the page table, formatted through
//! any `core::fmt::Write` sink.

use core::fmt::{self, Write};

use crate::page::{PageRole, PageTable, LINK_END};

/// Caps how many blocks-per-page the dump's free-list walk can record.
/// Every tuning this crate ships keeps `PAGE_BYTES / smallest_class` well
/// under this; a config with a far larger ratio would need this raised.
const MAX_BLOCKS_PER_PAGE: usize = 1024;

pub(crate) fn write_dump<W: Write, const PAGE_COUNT: usize, const CLASS_COUNT: usize>(
    sink: &mut W,
    table: &PageTable<PAGE_COUNT, CLASS_COUNT>,
    arena: &[u8],
    page_bytes: usize,
) -> fmt::Result {
    writeln!(sink, "========================================")?;
    writeln!(sink, "The amount of memory pages: {}", table.page_count())?;
    writeln!(sink, "----------------------------------------")?;

    for page in 0..table.page_count() {
        let addr = page * page_bytes;
        writeln!(sink, "Page #{page}")?;
        match table.descriptor(page).role {
            PageRole::Free => {
                writeln!(sink, "Address: {addr}; State: FREE")?;
            }
            PageRole::SmallBlockPage { class_size, free_count, free_head, .. } => {
                writeln!(sink, "Address: {addr}; State: FILLED WITH BLOCKS")?;
                write_small_block_page(sink, arena, page, page_bytes, class_size, free_count, free_head)?;
            }
            PageRole::MultiPageMember { run_length, remaining } => {
                writeln!(sink, "Address: {addr}; State: PART OF A MULTIPAGE BLOCK")?;
                write_multipage_member(sink, run_length, remaining)?;
            }
        }
        writeln!(sink, "----------------------------------------")?;
    }

    writeln!(sink, "========================================")
}

fn write_small_block_page<W: Write>(
    sink: &mut W,
    arena: &[u8],
    page: usize,
    page_bytes: usize,
    class_size: usize,
    free_count: usize,
    free_head: u32,
) -> fmt::Result {
    let total = page_bytes / class_size;
    let taken = total - free_count;
    writeln!(sink, "The classSize of the blocks: {class_size}")?;
    writeln!(sink, "The total amount of blocks: {total}")?;
    writeln!(sink, "From those: TAKEN: {taken}; FREE: {free_count}")?;

    debug_assert!(total <= MAX_BLOCKS_PER_PAGE);
    let mut is_free = [false; MAX_BLOCKS_PER_PAGE];
    let page_base = page * page_bytes;
    let mut cursor = free_head;
    while cursor != LINK_END {
        is_free[cursor as usize / class_size] = true;
        let at = page_base + cursor as usize;
        cursor = u32::from_ne_bytes(arena[at..at + 4].try_into().expect("4-byte slice"));
    }

    for i in 0..total {
        let addr = page_base + i * class_size;
        let state = if is_free[i] { "FREE" } else { "TAKEN" };
        writeln!(sink, "Block #{i}. Address: {addr}. {state}")?;
    }
    Ok(())
}

fn write_multipage_member<W: Write>(sink: &mut W, run_length: u32, remaining: u32) -> fmt::Result {
    if remaining == run_length {
        writeln!(sink, "This block is {run_length} pages long")?;
    }
    if run_length == 1 {
        writeln!(sink, "This block is a fullpage block")?;
    } else {
        let position = run_length - remaining + 1;
        writeln!(sink, "This page is a part #{position} of a multipage block")?;
    }
    Ok(())
}
