//! Block headers and the address arithmetic that walks them (§4.3).

use core::ptr::NonNull;

/// Whether a block is available for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Free,
    Allocated,
}

/// The metadata prefixing every block's payload bytes.
///
/// Laid out so that a block's free-index links (`fi_prev`/`fi_next`) live
/// inside the header at all times, rather than being unioned with payload
/// bytes — they are simply stale and unread while the block is
/// [`BlockStatus::Allocated`]. This costs a little space per header but
/// avoids aliasing live payload memory through an unsafe union for a saving
/// the spec does not ask for.
#[repr(C)]
pub struct BlockHeader {
    pub status: BlockStatus,
    /// Payload bytes this block can hold, excluding the header itself.
    pub data_block_size: usize,
    /// Distance in bytes from the start of the hosting page to this header.
    pub offset: usize,
    /// Previous block in the hosting page's linear, address-ascending list.
    pub prev: Option<NonNull<BlockHeader>>,
    /// Next block in the hosting page's linear, address-ascending list.
    pub next: Option<NonNull<BlockHeader>>,
    /// Previous node in the owning record's free-block index.
    ///
    /// Valid only while `status == BlockStatus::Free`.
    pub fi_prev: Option<NonNull<BlockHeader>>,
    /// Next node in the owning record's free-block index.
    ///
    /// Valid only while `status == BlockStatus::Free`.
    pub fi_next: Option<NonNull<BlockHeader>>,
}

/// Size, in bytes, of a block header. Referred to as `HEADER` in the spec.
pub const HEADER: usize = core::mem::size_of::<BlockHeader>();

impl BlockHeader {
    /// Initializes a freshly-placed header in place at `at`.
    ///
    /// # Safety
    /// `at` must point to writable memory at least `HEADER` bytes wide and
    /// correctly aligned for `BlockHeader`.
    pub unsafe fn init(at: NonNull<BlockHeader>, data_block_size: usize, offset: usize) {
        at.as_ptr().write(BlockHeader {
            status: BlockStatus::Free,
            data_block_size,
            offset,
            prev: None,
            next: None,
            fi_prev: None,
            fi_next: None,
        });
    }

    /// The address `HEADER` bytes after this header's `data_block_size`
    /// payload bytes end — i.e. where a contiguous successor block's header
    /// would start if there were no hard-IF residue.
    ///
    /// Only valid to compare against an *actual* successor's address when
    /// `self.next` is non-null; it is not a substitute for following `next`.
    pub unsafe fn next_by_size(this: NonNull<BlockHeader>) -> NonNull<u8> {
        Self::offset_by(this, this.as_ref().data_block_size)
    }

    /// The address `HEADER + payload_bytes` after this header, for an
    /// arbitrary `payload_bytes` rather than the header's own
    /// `data_block_size`. Used when carving a smaller allocation out of a
    /// larger free block, before the header's size field is updated.
    pub unsafe fn offset_by(this: NonNull<BlockHeader>, payload_bytes: usize) -> NonNull<u8> {
        NonNull::new_unchecked((this.as_ptr() as *mut u8).add(HEADER + payload_bytes))
    }

    /// Recovers the hosting page's base address from a block's `offset`.
    pub unsafe fn page_of(this: NonNull<BlockHeader>) -> NonNull<u8> {
        let offset = this.as_ref().offset;
        NonNull::new_unchecked((this.as_ptr() as *mut u8).sub(offset))
    }

    /// Byte address immediately following this header's payload, i.e. the
    /// concrete end of the block as currently sized (as opposed to
    /// [`next_by_size`](Self::next_by_size), which is about successor
    /// placement).
    pub unsafe fn payload_end(this: NonNull<BlockHeader>) -> NonNull<u8> {
        Self::next_by_size(this)
    }

    /// Pointer to this block's payload region (immediately after the header).
    pub fn payload(this: NonNull<BlockHeader>) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked((this.as_ptr() as *mut u8).add(HEADER)) }
    }

    /// Recovers a block header pointer from a payload pointer previously
    /// handed to a caller.
    ///
    /// # Safety
    /// `payload` must be a pointer previously returned as a block's payload
    /// (i.e. via [`payload`](Self::payload)).
    pub unsafe fn header_of_payload(payload: NonNull<u8>) -> NonNull<BlockHeader> {
        NonNull::new_unchecked(payload.as_ptr().sub(HEADER) as *mut BlockHeader)
    }
}
