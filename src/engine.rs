//! The allocation engine: `xcalloc`/`xfree` over registered records (§4.4).
//!
//! Grounded on `_mm_allocate_free_data_block`, `_mm_split_free_data_block_for_allocation`,
//! `_mm_free_data_block`, `_mm_merge_free_blocks` and `_mm_get_hard_internal_frag_size`
//! in the original C allocator, generalized over [`PageSource`] so the same
//! splitting and coalescing logic runs against both real OS pages and the
//! in-memory test double.

use crate::block::{BlockHeader, BlockStatus, HEADER};
use crate::page::DataPage;
use crate::page_source::{MmapPageSource, PageSource};
use crate::registry::{RecordDescriptor, RegisterError, Registry};
use core::ptr::NonNull;

/// A page-backed, type-aware object allocator.
///
/// An `Allocator` owns its own registry and page source, so tests can run
/// many independent instances in parallel without sharing OS-level state;
/// [`crate::default_allocator`] provides the process-wide singleton the
/// surface-level `xcalloc`/`xfree` are generally expected to share.
pub struct Allocator<S: PageSource = MmapPageSource> {
    source: S,
    page_size: usize,
    registry: Registry,
}

impl Allocator<MmapPageSource> {
    /// Creates an allocator backed by real OS pages, sized to the host's
    /// actual page size.
    pub fn new() -> Self {
        let page_size = crate::syscall::query_page_size();
        Self::with_page_size(MmapPageSource, page_size)
    }
}

impl Default for Allocator<MmapPageSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PageSource> Allocator<S> {
    /// Creates an allocator over a custom page source and page size, for
    /// tests that want to exercise splitting/merging against small,
    /// fast-to-allocate pages.
    pub fn with_page_size(source: S, page_size: usize) -> Self {
        Self {
            source,
            page_size,
            registry: Registry::new(page_size),
        }
    }

    /// Registers a new record type. See [`Registry::register`].
    pub fn register(&mut self, name: &str, size: usize) -> Result<NonNull<RecordDescriptor>, RegisterError> {
        self.registry.register(&self.source, name, size)
    }

    /// Looks up a previously registered record by name.
    pub fn lookup(&self, name: &str) -> Option<NonNull<RecordDescriptor>> {
        self.registry.lookup(name)
    }

    /// Iterates every registered record, for diagnostics.
    pub fn records(&self) -> impl Iterator<Item = &RecordDescriptor> {
        self.registry.iter()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Allocates zero-filled space for `units` contiguous instances of the
    /// named record.
    ///
    /// Returns a null pointer if the record is unknown, `units` is zero, the
    /// request overflows, or no page (existing or newly mapped) can host a
    /// block this large.
    ///
    /// # Safety
    /// The returned pointer, when non-null, must eventually be passed to
    /// [`Allocator::xfree`] on this same allocator and not freed twice.
    pub unsafe fn xcalloc(&mut self, name: &str, units: usize) -> *mut u8 {
        let Some(mut record) = self.registry.lookup(name) else {
            return core::ptr::null_mut();
        };
        if units == 0 {
            return core::ptr::null_mut();
        }
        let Some(requested) = record.as_ref().size.checked_mul(units) else {
            return core::ptr::null_mut();
        };
        // A request that could never fit a freshly-mapped page fails here,
        // with no page source interaction at all, rather than discovering
        // that only after mapping and immediately releasing one.
        let usable = self.page_size - crate::page::PAGE_HEADER_BYTES - HEADER;
        if requested > usable {
            return core::ptr::null_mut();
        }

        let block = match self.find_or_make_room(record, requested) {
            Some(block) => block,
            None => return core::ptr::null_mut(),
        };

        record.as_mut().free_index.remove(block);
        let mut allocated = split_for_allocation(block, requested, &mut record.as_mut().free_index);
        allocated.as_mut().status = BlockStatus::Allocated;

        let payload = BlockHeader::payload(allocated);
        core::ptr::write_bytes(payload.as_ptr(), 0, requested);
        payload.as_ptr()
    }

    /// Finds a free block able to hold `requested` bytes, mapping a new page
    /// for `record` if none of its existing pages can.
    fn find_or_make_room(&mut self, mut record: NonNull<RecordDescriptor>, requested: usize) -> Option<NonNull<BlockHeader>> {
        // The index is ordered descending, so the largest block alone tells
        // us whether *any* block fits.
        if let Some(largest) = unsafe { record.as_ref().free_index.peek_max() } {
            if unsafe { largest.as_ref().data_block_size } >= requested {
                return Some(largest);
            }
        }

        let page = DataPage::new_in(&self.source, self.page_size, record)?;
        unsafe {
            let first = DataPage::first_block(page);
            if first.as_ref().data_block_size < requested {
                // Even a brand new page cannot host this request; undo the
                // mapping rather than leaving an unreachable empty page.
                DataPage::release(page, &self.source, self.page_size);
                return None;
            }

            let mut page = page;
            page.as_mut().next = record.as_ref().pages;
            if let Some(mut old_head) = record.as_ref().pages {
                old_head.as_mut().prev = Some(page);
            }
            record.as_mut().pages = Some(page);

            record.as_mut().free_index.insert(first);
            Some(first)
        }
    }

    /// Releases a block previously returned by [`Allocator::xcalloc`].
    ///
    /// # Safety
    /// `ptr` must be a still-live pointer returned by `xcalloc` on this same
    /// allocator, not previously freed.
    pub unsafe fn xfree(&mut self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else { return };
        let mut header = BlockHeader::header_of_payload(payload);
        debug_assert_eq!(header.as_ref().status, BlockStatus::Allocated, "double free or invalid pointer");

        header.as_mut().status = BlockStatus::Free;
        let page = BlockHeader::page_of(header).cast::<DataPage>();
        let mut record = page.as_ref().record;

        absorb_hard_if_residue(header, page, self.page_size);

        let merged = coalesce(record, header);
        record.as_mut().free_index.insert(merged);

        if DataPage::is_empty(page, self.page_size) {
            record.as_mut().free_index.remove(DataPage::first_block(page));
            self.unlink_page(record, page);
            DataPage::release(page, &self.source, self.page_size);
        }
    }

    unsafe fn unlink_page(&mut self, mut record: NonNull<RecordDescriptor>, page: NonNull<DataPage>) {
        let page_ref = page.as_ref();
        match page_ref.prev {
            Some(mut prev) => prev.as_mut().next = page_ref.next,
            None => record.as_mut().pages = page_ref.next,
        }
        if let Some(mut next) = page_ref.next {
            next.as_mut().prev = page_ref.prev;
        }
    }
}

/// Absorbs the hard-internal-fragmentation gap, if any, between where
/// `header`'s payload nominally ends (`next_by_size`) and where its actual
/// successor starts (or the page end, if `header` is the rightmost block).
///
/// This residue was never reflected in any block header (that's what makes
/// it "hard" rather than "soft"): a split that left a remainder too small to
/// host a header just grew the allocated block's effective footprint without
/// growing its recorded `data_block_size`. Reclaiming it here, unconditionally
/// and before either merge step, is the only place that space comes back.
unsafe fn absorb_hard_if_residue(mut header: NonNull<BlockHeader>, page: NonNull<DataPage>, page_size: usize) {
    let nominal_end = BlockHeader::next_by_size(header).as_ptr() as usize;
    let actual_end = match header.as_ref().next {
        Some(next) => next.as_ptr() as usize,
        None => page.as_ptr() as usize + page_size,
    };
    header.as_mut().data_block_size += actual_end - nominal_end;
}

/// Merges `header` with a free right neighbour, then a free left
/// neighbour, in that order, and returns the surviving block.
///
/// Right-then-left mirrors the original coalescing order: merging right
/// first means the left merge (if any) only ever has to re-link once.
unsafe fn coalesce(mut record: NonNull<RecordDescriptor>, header: NonNull<BlockHeader>) -> NonNull<BlockHeader> {
    let mut current = header;

    if let Some(right) = current.as_ref().next {
        if right.as_ref().status == BlockStatus::Free {
            record.as_mut().free_index.remove(right);
            merge_into_left(current, right);
        }
    }

    if let Some(left) = current.as_ref().prev {
        if left.as_ref().status == BlockStatus::Free {
            record.as_mut().free_index.remove(left);
            merge_into_left(left, current);
            current = left;
        }
    }

    current
}

/// Splits `block` (already removed from the free index) to serve a
/// `requested`-byte allocation, inserting any leftover free remainder back
/// into `index`. Returns the (possibly resized) now-allocated block.
///
/// - Residue of zero bytes: exact fit, no split (case A).
/// - Residue too small to host a [`BlockHeader`]: absorbed into the
///   allocated block as internal fragmentation, returned to the pool only
///   when the whole block is freed (case C, hard internal fragmentation).
/// - Otherwise: carved into a new free block of its own, linked in right
///   after `block` (cases B/D, soft internal fragmentation).
unsafe fn split_for_allocation(
    mut block: NonNull<BlockHeader>,
    requested: usize,
    index: &mut crate::freelist::FreeBlockIndex,
) -> NonNull<BlockHeader> {
    let available = block.as_ref().data_block_size;
    let residue = available - requested;

    // "Mark L.is_free = ALLOCATED, set L.data_block_size = req" applies
    // unconditionally, before the case split below. For case C (hard
    // internal fragmentation) this is the only place the residue is ever
    // recorded as reclaimable: it must not linger in `data_block_size`.
    block.as_mut().data_block_size = requested;

    // Case A (`residue == 0`, exact fit) and case C (`0 < residue <= HEADER`,
    // hard internal fragmentation: too small to host a header) both leave
    // `block` unsplit. Cases B/D (`residue > HEADER`) carve a new free block.
    if residue <= HEADER {
        return block;
    }

    let remainder_size = residue - HEADER;
    let remainder_offset = block.as_ref().offset + HEADER + requested;
    let remainder_ptr = NonNull::new_unchecked(BlockHeader::offset_by(block, requested).as_ptr() as *mut BlockHeader);

    BlockHeader::init(remainder_ptr, remainder_size, remainder_offset);
    let mut remainder = remainder_ptr;

    remainder.as_mut().next = block.as_ref().next;
    if let Some(mut old_next) = block.as_ref().next {
        old_next.as_mut().prev = Some(remainder);
    }
    remainder.as_mut().prev = Some(block);
    block.as_mut().next = Some(remainder);

    index.insert(remainder);

    block
}

/// Absorbs `right` into `left`: extends `left`'s size to cover `right`'s
/// header and payload, and relinks the linear list around `right`.
unsafe fn merge_into_left(mut left: NonNull<BlockHeader>, right: NonNull<BlockHeader>) {
    let absorbed = HEADER + right.as_ref().data_block_size;
    left.as_mut().data_block_size += absorbed;
    left.as_mut().next = right.as_ref().next;
    if let Some(mut new_next) = right.as_ref().next {
        new_next.as_mut().prev = Some(left);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_source::HeapPageSource;

    fn test_allocator(page_size: usize) -> Allocator<HeapPageSource> {
        Allocator::with_page_size(HeapPageSource, page_size)
    }

    #[test]
    fn allocates_and_frees_a_single_unit() {
        let mut alloc = test_allocator(4096);
        alloc.register("widget", 64).unwrap();
        unsafe {
            let ptr = alloc.xcalloc("widget", 1);
            assert!(!ptr.is_null());
            core::ptr::write_bytes(ptr, 0xAA, 64);
            alloc.xfree(ptr);
        }
    }

    #[test]
    fn unknown_record_returns_null() {
        let mut alloc = test_allocator(4096);
        unsafe {
            assert!(alloc.xcalloc("ghost", 1).is_null());
        }
    }

    #[test]
    fn zero_units_returns_null() {
        let mut alloc = test_allocator(4096);
        alloc.register("widget", 64).unwrap();
        unsafe {
            assert!(alloc.xcalloc("widget", 0).is_null());
        }
    }

    #[test]
    fn freed_adjacent_blocks_coalesce_back_to_one_page() {
        let mut alloc = test_allocator(4096);
        alloc.register("widget", 64).unwrap();
        unsafe {
            let a = alloc.xcalloc("widget", 1);
            let b = alloc.xcalloc("widget", 1);
            let c = alloc.xcalloc("widget", 1);
            assert!(!a.is_null() && !b.is_null() && !c.is_null());

            alloc.xfree(a);
            alloc.xfree(c);
            alloc.xfree(b);

            // Page should have released; a subsequent allocation must map a
            // fresh page rather than reuse a dangling one. This is exercised
            // indirectly: the call must still succeed.
            let d = alloc.xcalloc("widget", 1);
            assert!(!d.is_null());
            alloc.xfree(d);
        }
    }

    #[test]
    fn exhausts_one_page_then_maps_another() {
        let page_size = 512;
        let mut alloc = test_allocator(page_size);
        alloc.register("widget", 32).unwrap();
        let mut ptrs = Vec::new();
        unsafe {
            for _ in 0..64 {
                let ptr = alloc.xcalloc("widget", 1);
                if ptr.is_null() {
                    break;
                }
                ptrs.push(ptr);
            }
            assert!(ptrs.len() >= 2, "expected at least two pages worth of blocks");
            for ptr in ptrs {
                alloc.xfree(ptr);
            }
        }
    }

    /// Reallocating into a block a previous allocation dirtied must not
    /// observe the earlier tenant's bytes (property 7, round-trip zeroing).
    #[test]
    fn reused_block_is_rezeroed_not_just_fresh_pages() {
        let mut alloc = test_allocator(4096);
        alloc.register("widget", 64).unwrap();
        unsafe {
            let first = alloc.xcalloc("widget", 1);
            core::ptr::write_bytes(first, 0xFF, 64);
            alloc.xfree(first);

            let second = alloc.xcalloc("widget", 1);
            assert_eq!(first, second, "expected the freed block to be reused");
            let bytes = core::slice::from_raw_parts(second, 64);
            assert!(bytes.iter().all(|&b| b == 0), "reused block must be rezeroed");
            alloc.xfree(second);
        }
    }

    /// A split residue of exactly `HEADER` bytes is hard internal
    /// fragmentation (case C, `0 < rem <= HEADER`): no trailing free block is
    /// carved off, and the full residue comes back once `B` is freed.
    #[test]
    fn residue_of_exactly_header_bytes_is_hard_fragmentation() {
        use crate::block::HEADER;
        use crate::page::PAGE_HEADER_BYTES;

        let usable = 512 - PAGE_HEADER_BYTES - HEADER;
        let record_size = usable - HEADER; // rem == HEADER exactly
        let mut alloc = test_allocator(512);
        alloc.register("exact", record_size).unwrap();
        unsafe {
            let ptr = alloc.xcalloc("exact", 1);
            assert!(!ptr.is_null());

            let record = alloc.lookup("exact").unwrap();
            let summary = crate::diagnostics::summarize(record.as_ref());
            assert_eq!(summary.allocated_blocks, 1);
            assert_eq!(summary.free_blocks, 0, "a HEADER-sized residue must not become its own block");
            assert_eq!(
                summary.allocated_bytes, record_size,
                "data_block_size must report the requested size, not the pre-split residue-inflated size"
            );

            alloc.xfree(ptr);
            let summary = crate::diagnostics::summarize(record.as_ref());
            assert_eq!(summary.free_blocks, 1);
            assert_eq!(
                summary.free_bytes, usable,
                "the hard-IF residue must be reclaimed in full on free"
            );
        }
    }
}
