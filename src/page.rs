//! Data pages: the unit of OS memory this allocator maps and releases (§4.4).
//!
//! A [`DataPage`] is a small fixed header followed immediately by one large
//! initial [`BlockHeader`] spanning the rest of the page. Pages belonging to
//! the same record are threaded together through `next`/`prev` so the engine
//! can walk every page of a type without consulting the registry.

use crate::block::{BlockHeader, BlockStatus, HEADER};
use crate::page_source::PageSource;
use crate::registry::RecordDescriptor;
use core::ptr::NonNull;

/// Header prefixing every mapped data page.
#[repr(C)]
pub struct DataPage {
    /// Next page holding blocks of the same record, in no particular order.
    pub next: Option<NonNull<DataPage>>,
    pub prev: Option<NonNull<DataPage>>,
    /// The record type this page's blocks are sized for.
    pub record: NonNull<RecordDescriptor>,
}

/// Bytes consumed by [`DataPage`] itself, before the first block header.
pub const PAGE_HEADER_BYTES: usize = core::mem::size_of::<DataPage>();

impl DataPage {
    /// Maps a fresh page from `source` and carves it into one free block
    /// spanning the whole usable area.
    ///
    /// Returns `None` if `source` cannot satisfy the request, or if
    /// `page_size` is too small to hold both a [`DataPage`] and a
    /// [`BlockHeader`].
    pub fn new_in<S: PageSource>(
        source: &S,
        page_size: usize,
        record: NonNull<RecordDescriptor>,
    ) -> Option<NonNull<DataPage>> {
        let usable = page_size.checked_sub(PAGE_HEADER_BYTES)?.checked_sub(HEADER)?;
        let base = source.acquire(page_size, 1)?;
        let page = base.cast::<DataPage>();
        unsafe {
            page.as_ptr().write(DataPage {
                next: None,
                prev: None,
                record,
            });
            let first = Self::first_block(page);
            BlockHeader::init(first, usable, PAGE_HEADER_BYTES);
        }
        Some(page)
    }

    /// The page's first (and, until split, only) block header.
    pub unsafe fn first_block(this: NonNull<DataPage>) -> NonNull<BlockHeader> {
        NonNull::new_unchecked((this.as_ptr() as *mut u8).add(PAGE_HEADER_BYTES) as *mut BlockHeader)
    }

    /// Whether this page currently holds no live allocations: its first
    /// block is free, has no successor, and spans the entire usable area.
    ///
    /// A page matching this condition is eligible for release back to the
    /// OS the moment a free completes (§4.4 step 6).
    pub unsafe fn is_empty(this: NonNull<DataPage>, page_size: usize) -> bool {
        let first = Self::first_block(this);
        let header = first.as_ref();
        let usable = page_size - PAGE_HEADER_BYTES - HEADER;
        header.status == BlockStatus::Free && header.next.is_none() && header.data_block_size == usable
    }

    /// Releases this page's backing memory.
    ///
    /// # Safety
    /// Caller must have already unlinked `this` from its record's page list
    /// and removed its block(s) from the free-block index; after this call
    /// `this` is dangling.
    pub unsafe fn release<S: PageSource>(this: NonNull<DataPage>, source: &S, page_size: usize) {
        source.release(this.cast::<u8>(), page_size, 1);
    }
}
