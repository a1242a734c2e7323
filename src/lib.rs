//! # `recordmem` - a page-backed, type-aware object allocator
//!
//! A userspace allocator in the spirit of `calloc`/`free`, except every
//! allocation is made against a named, pre-registered record type rather
//! than a raw byte count. Memory is drawn from the OS a page at a time via
//! anonymous `mmap` (`VirtualAlloc` on Windows), subdivided into
//! metadata-prefixed blocks, and handed back to the OS the instant a page
//! holds no more live allocations.
//!
//! ## Architecture
//!
//! - [`registry`] holds every registered record's name, size, page list and
//!   free-block index behind a stable-address descriptor.
//! - [`page_source`] abstracts the OS page-mapping call behind a trait, so
//!   the engine can run against real pages or an in-memory test double.
//! - [`page`] and [`block`] describe the physical layout: a page is a small
//!   header followed by one or more blocks, each prefixed by a
//!   [`block::BlockHeader`].
//! - [`freelist`] is the intrusive, size-ordered index each record keeps of
//!   its own free blocks.
//! - [`engine`] ties it together: [`engine::Allocator`] is the type most
//!   callers reach for.
//! - [`diagnostics`] is pull-based, read-only introspection; nothing in
//!   `engine` logs on its own.
//!
//! ## Example
//!
//! ```rust
//! use recordmem::engine::Allocator;
//!
//! let mut alloc = Allocator::new();
//! alloc.register("connection", std::mem::size_of::<[u8; 64]>()).unwrap();
//!
//! unsafe {
//!     let ptr = alloc.xcalloc("connection", 1);
//!     assert!(!ptr.is_null());
//!     alloc.xfree(ptr);
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod constants;
pub mod diagnostics;
pub mod engine;
pub mod freelist;
pub mod page;
pub mod page_source;
pub mod registry;
pub mod syscall;

pub use block::{BlockHeader, BlockStatus};
pub use engine::Allocator;
pub use page_source::{MmapPageSource, PageSource};
pub use registry::{RecordDescriptor, RegisterError};

use std::sync::{Mutex, OnceLock};

/// The process-wide default allocator.
///
/// Most callers are expected to share this instance rather than construct
/// their own; tests and callers that need isolation construct
/// [`Allocator`] directly instead. Guarded by a [`Mutex`] purely to satisfy
/// Rust's rules around mutable statics — the allocator itself has no
/// internal locking and assumes single-threaded use per instance (see
/// `Non-goals`).
pub fn default_allocator() -> &'static Mutex<Allocator> {
    static DEFAULT: OnceLock<Mutex<Allocator>> = OnceLock::new();
    DEFAULT.get_or_init(|| Mutex::new(Allocator::new()))
}

// Compile-time layout sanity checks.
const _: () = {
    use core::mem;

    // A block header must be pointer-aligned so payloads that follow it
    // inherit at least pointer alignment.
    assert!(block::HEADER % mem::align_of::<usize>() == 0);

    // The registry's per-page descriptor capacity must be able to hold at
    // least one record, or registration can never succeed.
    assert!(constants::MAX_RECORDS_PER_PAGE > 0);
};
