//! Error kinds returned by the allocator engine.

use core::fmt;

/// Failure of [`crate::Allocator::alloc`] / the alloc half of `realloc`.
///
/// Always a normal, expected outcome, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No page could be subdivided for the requested class (small path), or
    /// no contiguous run of the required length exists (multi-page path).
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("out of memory")
    }
}

/// Failure of [`crate::Allocator::free`] / the free half of `realloc`.
///
/// Covers double-free, a foreign pointer, and a mid-run multi-page address.
/// The allocator guarantees it has not mutated any of its structures when
/// this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    InvalidAddress,
}

impl fmt::Display for FreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("address is not the head of a live block")
    }
}

/// Failure of [`crate::Allocator::realloc`].
///
/// `realloc` is built from an alloc followed by a free, so it can fail
/// either way its two halves can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReallocError {
    OutOfMemory,
    InvalidAddress,
}

impl fmt::Display for ReallocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReallocError::OutOfMemory => f.write_str("out of memory"),
            ReallocError::InvalidAddress => f.write_str("address is not the head of a live block"),
        }
    }
}

impl From<AllocError> for ReallocError {
    fn from(e: AllocError) -> Self {
        match e {
            AllocError::OutOfMemory => ReallocError::OutOfMemory,
        }
    }
}

impl From<FreeError> for ReallocError {
    fn from(e: FreeError) -> Self {
        match e {
            FreeError::InvalidAddress => ReallocError::InvalidAddress,
        }
    }
}

/// Failure to construct an [`crate::Allocator`] from its tunable constants.
///
/// Construction-time validation; on failure no allocator instance exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `PAGE_BYTES` is not at least twice the largest class size.
    PageTooSmall,
    /// `ARENA_BYTES` is not an exact multiple of `PAGE_BYTES`.
    ArenaNotPageMultiple,
    /// The smallest class (and hence the whole geometric series derived
    /// from it) is not a power of two.
    ClassNotPowerOfTwo,
    /// The smallest class is narrower than a link cell, so a free block of
    /// that class could not hold the intrusive free-list link.
    ClassTooSmallForLinkCell,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PageTooSmall => f.write_str("PAGE_BYTES must be at least 2x the largest class"),
            ConfigError::ArenaNotPageMultiple => f.write_str("ARENA_BYTES must be a multiple of PAGE_BYTES"),
            ConfigError::ClassNotPowerOfTwo => f.write_str("class sizes must be ascending powers of two"),
            ConfigError::ClassTooSmallForLinkCell => f.write_str("smallest class is too small to hold a free-list link"),
        }
    }
}
