//! The top-level engine type tying size-class selection, the small-block
//! allocator, the multi-page allocator, and the dump together behind the
//! four public operations: `alloc`, `realloc`, `free`, `dump`.

use core::fmt;
use core::ptr::NonNull;

use crate::error::{AllocError, ConfigError, FreeError, ReallocError};
use crate::page::PageTable;
use crate::size_class::ClassTable;
use crate::{dump, multipage, small};

/// A fixed-arena, two-tier allocator over an inline `[u8; ARENA_BYTES]`
/// buffer.
///
/// `ARENA_BYTES`, `PAGE_BYTES`, `CLASS_COUNT` and `SMALLEST_CLASS` are
/// compile-time tunables; [`Allocator::new`] validates their mutual
/// consistency and returns [`ConfigError`] if they do not hold.
///
/// # Safety / soundness note
///
/// The arena lives inline in this struct. Like `bumpalo::Bump`, any pointer
/// returned by [`Allocator::alloc_raw`]/[`Allocator::alloc`] is only valid
/// for as long as the `Allocator` value itself is not moved; moving an
/// `Allocator` with outstanding pointers is undefined behaviour because
/// those pointers become dangling. Callers that need a movable allocator
/// should box it or pin it.
pub struct Allocator<
    const ARENA_BYTES: usize,
    const PAGE_BYTES: usize,
    const PAGE_COUNT: usize,
    const CLASS_COUNT: usize,
    const SMALLEST_CLASS: usize,
> {
    arena: [u8; ARENA_BYTES],
    table: PageTable<PAGE_COUNT, CLASS_COUNT>,
    classes: ClassTable<CLASS_COUNT>,
}

/// The default tuning: a 2KiB arena, 256-byte pages (`PAGE_COUNT = 8`), and
/// the class series `{16, 32, 64, 128}`.
pub type DefaultAllocator = Allocator<2048, 256, 8, 4, 16>;

impl<
        const ARENA_BYTES: usize,
        const PAGE_BYTES: usize,
        const PAGE_COUNT: usize,
        const CLASS_COUNT: usize,
        const SMALLEST_CLASS: usize,
    > Allocator<ARENA_BYTES, PAGE_BYTES, PAGE_COUNT, CLASS_COUNT, SMALLEST_CLASS>
{
    // Checked fully at compile time, per instantiation: the three checks in
    // `new()` below cover the cross-parameter arithmetic that const generics
    // can't express on their own, but these three are plain per-parameter
    // facts, so they're caught at monomorphization instead of at runtime.
    sa::const_assert!(CLASS_COUNT > 0);
    sa::const_assert!(PAGE_COUNT > 0);
    sa::const_assert!(SMALLEST_CLASS > 0);

    /// Construct a fresh allocator with every page in the Free role.
    ///
    /// Validates the tunables' mutual consistency: `PAGE_BYTES >= 2 *
    /// largest_class`, `ARENA_BYTES == PAGE_COUNT * PAGE_BYTES`, and every
    /// class a positive power of two. `PAGE_COUNT` is a separate const
    /// generic rather than a computed `ARENA_BYTES / PAGE_BYTES` because
    /// stable Rust cannot use an expression over other const generics as an
    /// array length; this constructor is where the two are cross-checked
    /// instead.
    pub fn new() -> Result<Self, ConfigError> {
        if ARENA_BYTES != PAGE_COUNT * PAGE_BYTES {
            return Err(ConfigError::ArenaNotPageMultiple);
        }

        let classes: ClassTable<CLASS_COUNT> = ClassTable::new(SMALLEST_CLASS);
        if !classes.all_powers_of_two() {
            return Err(ConfigError::ClassNotPowerOfTwo);
        }
        if PAGE_BYTES < 2 * classes.largest() {
            return Err(ConfigError::PageTooSmall);
        }
        if SMALLEST_CLASS < core::mem::size_of::<u32>() {
            return Err(ConfigError::ClassTooSmallForLinkCell);
        }

        Ok(Self {
            arena: [0u8; ARENA_BYTES],
            table: PageTable::new(),
            classes,
        })
    }

    /// A request of exactly half a page is still the small path's problem,
    /// not the multi-page path's: with the default tuning the largest small
    /// class is itself `PAGE_BYTES / 2`, so this is the top of the small
    /// path rather than the bottom of the multi-page one. A tuning whose
    /// largest class falls short of `PAGE_BYTES / 2` is still handled
    /// correctly by `alloc_offset`, which falls back to the multi-page path
    /// whenever no class actually fits, regardless of this threshold.
    #[inline]
    fn is_small_path(&self, n_bytes: usize) -> bool {
        n_bytes <= PAGE_BYTES / 2
    }

    /// Allocate at least `n_bytes` usable bytes, returning a pointer to the
    /// arena's inline buffer valid for the block's lifetime.
    pub fn alloc(&mut self, n_bytes: usize) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(n_bytes >= 1);
        let offset = self.alloc_offset(n_bytes)?;
        // SAFETY: `offset` is in-bounds of `self.arena` by construction of
        // every path inside `alloc_offset`.
        let ptr = unsafe { self.arena.as_mut_ptr().add(offset) };
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    /// Raw-pointer entry point with C-style null-on-failure semantics.
    pub fn alloc_raw(&mut self, n_bytes: usize) -> *mut u8 {
        self.alloc(n_bytes).map(|p| p.as_ptr()).unwrap_or(core::ptr::null_mut())
    }

    fn alloc_offset(&mut self, n_bytes: usize) -> Result<usize, AllocError> {
        match self.classes.closest_class(n_bytes) {
            Some(class_index) if self.is_small_path(n_bytes) => {
                small::alloc(&mut self.arena, &mut self.table, &self.classes, PAGE_BYTES, class_index)
            }
            _ => {
                let page_count = div_ceil(n_bytes, PAGE_BYTES);
                multipage::alloc(&mut self.table, PAGE_BYTES, page_count)
            }
        }
    }

    /// Release a block previously returned by [`Allocator::alloc`] or
    /// [`Allocator::realloc`].
    pub fn free(&mut self, ptr: NonNull<u8>) -> Result<(), FreeError> {
        let offset = self.offset_of(ptr)?;
        self.free_offset(offset)
    }

    /// Raw-pointer entry point; a null pointer is treated as a no-op, as is
    /// conventional for C-style `free`.
    pub fn free_raw(&mut self, ptr: *mut u8) -> Result<(), FreeError> {
        match NonNull::new(ptr) {
            Some(p) => self.free(p),
            None => Ok(()),
        }
    }

    fn free_offset(&mut self, offset: usize) -> Result<(), FreeError> {
        let page = offset / PAGE_BYTES;
        match self.table.descriptor(page).role {
            crate::page::PageRole::SmallBlockPage { .. } => {
                small::free(&mut self.arena, &mut self.table, PAGE_BYTES, page, offset)
            }
            crate::page::PageRole::MultiPageMember { .. } => multipage::free(&mut self.table, page),
            crate::page::PageRole::Free => {
                log::warn!("free: page {page} is already Free (double-free or foreign pointer)");
                Err(FreeError::InvalidAddress)
            }
        }
    }

    /// Allocate fresh, copy the overlapping payload, then free the original.
    /// The original block is left untouched if the fresh allocation fails.
    pub fn realloc(&mut self, ptr: NonNull<u8>, new_size: usize) -> Result<NonNull<u8>, ReallocError> {
        let old_offset = self.offset_of(ptr).map_err(ReallocError::from)?;
        let old_payload = self.payload_len_of(old_offset);

        let new_offset = self.alloc_offset(new_size).map_err(ReallocError::from)?;

        let copy_len = core::cmp::min(old_payload, self.payload_len_of(new_offset));
        self.arena.copy_within(old_offset..old_offset + copy_len, new_offset);

        self.free_offset(old_offset).map_err(ReallocError::from)?;

        let new_ptr = unsafe { self.arena.as_mut_ptr().add(new_offset) };
        Ok(unsafe { NonNull::new_unchecked(new_ptr) })
    }

    pub fn realloc_raw(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        match NonNull::new(ptr) {
            Some(p) => self.realloc(p, new_size).map(|p| p.as_ptr()).unwrap_or(core::ptr::null_mut()),
            None => self.alloc_raw(new_size),
        }
    }

    fn payload_len_of(&self, offset: usize) -> usize {
        let page = offset / PAGE_BYTES;
        match self.table.descriptor(page).role {
            crate::page::PageRole::SmallBlockPage { class_size, .. } => class_size,
            crate::page::PageRole::MultiPageMember { run_length, .. } => run_length as usize * PAGE_BYTES,
            crate::page::PageRole::Free => 0,
        }
    }

    fn offset_of(&self, ptr: NonNull<u8>) -> Result<usize, FreeError> {
        let base = self.arena.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        if addr < base || addr >= base + ARENA_BYTES {
            return Err(FreeError::InvalidAddress);
        }
        Ok(addr - base)
    }

    /// Write a human-readable snapshot of every page to `sink`. Read-only.
    pub fn dump<W: fmt::Write>(&self, sink: &mut W) -> fmt::Result {
        dump::write_dump(sink, &self.table, &self.arena, PAGE_BYTES)
    }
}

fn div_ceil(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}
