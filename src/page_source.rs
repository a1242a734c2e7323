//! The abstract "page source" the allocation engine draws pages from (§4.1).

use core::alloc::Layout;
use core::ptr::NonNull;

/// A source of zero-filled, page-aligned memory runs.
///
/// Implementations must return memory that is already zeroed; the engine
/// relies on this to avoid re-zeroing freshly split blocks.
pub trait PageSource {
    /// Maps `n_pages` contiguous pages of size `page_size` each.
    ///
    /// Returns `None` if the OS refuses the request.
    fn acquire(&self, page_size: usize, n_pages: usize) -> Option<NonNull<u8>>;

    /// Releases a region previously returned by [`acquire`](Self::acquire) with
    /// the same `page_size` and `n_pages`.
    ///
    /// # Safety
    /// `base` must be a still-valid, not-yet-released region obtained from
    /// this same source with these exact parameters.
    unsafe fn release(&self, base: NonNull<u8>, page_size: usize, n_pages: usize);
}

/// The production page source: one `mmap`/`VirtualAlloc` call per page run,
/// with no caching layer.
///
/// A page is requested exactly when the engine needs one and released back
/// to the OS the instant it becomes empty (§4.4 step 6) — unlike the
/// general-purpose allocator elsewhere in this codebase, this allocator must
/// not retain freed pages, so there is deliberately no page cache here.
#[derive(Default, Clone, Copy, Debug)]
pub struct MmapPageSource;

impl PageSource for MmapPageSource {
    fn acquire(&self, page_size: usize, n_pages: usize) -> Option<NonNull<u8>> {
        let region = unsafe { crate::syscall::allocate_region(page_size * n_pages)? };
        NonNull::new(region)
    }

    unsafe fn release(&self, base: NonNull<u8>, page_size: usize, n_pages: usize) {
        crate::syscall::free_region(base.as_ptr(), page_size * n_pages);
    }
}

/// A test double backed by the global heap allocator.
///
/// Used by the unit and property test suites so they exercise the engine's
/// own bookkeeping without depending on real OS page accounting (mapping
/// thousands of individual 4KB pages in a property test is needlessly slow
/// and couples the test outcome to OS-level mmap behavior).
#[derive(Default, Clone, Copy, Debug)]
pub struct HeapPageSource;

impl PageSource for HeapPageSource {
    fn acquire(&self, page_size: usize, n_pages: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(page_size * n_pages, page_size).ok()?;
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        NonNull::new(ptr)
    }

    unsafe fn release(&self, base: NonNull<u8>, page_size: usize, n_pages: usize) {
        let layout = Layout::from_size_align_unchecked(page_size * n_pages, page_size);
        std::alloc::dealloc(base.as_ptr(), layout);
    }
}
