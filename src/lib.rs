//! A fixed-arena, two-tier memory allocator: a segregated-fit small-object
//! allocator for requests under half a page, and a contiguous multi-page
//! allocator above that. The backing buffer is owned at construction time;
//! the engine never touches the host OS and is single-threaded.
//!
//! The public surface is four operations: [`Allocator::alloc`],
//! [`Allocator::realloc`], [`Allocator::free`], and [`Allocator::dump`],
//! plus raw-pointer counterparts (`alloc_raw`, `free_raw`, `realloc_raw`) for
//! callers that want C-style null-on-failure semantics instead of `Result`.
//!
//! ```
//! use arenalloc::DefaultAllocator;
//!
//! let mut a = DefaultAllocator::new().unwrap();
//! let p = a.alloc(15).unwrap();
//! a.free(p).unwrap();
//! ```
#![cfg_attr(not(test), no_std)]

mod allocator;
mod dump;
mod error;
mod multipage;
mod page;
mod size_class;
mod small;
mod util;

pub use allocator::{Allocator, DefaultAllocator};
pub use error::{AllocError, ConfigError, FreeError, ReallocError};
