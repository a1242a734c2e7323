#![cfg(unix)]

use libc::{c_void, mmap, munmap, sysconf, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, _SC_PAGESIZE};
use std::ptr;

/// Maps `size` bytes of zero-filled, anonymous, readable/writable memory.
///
/// Returns `None` if the kernel refuses the mapping.
pub unsafe fn allocate_region(size: usize) -> Option<*mut u8> {
    let ptr = mmap(
        ptr::null_mut(),
        size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
    );

    if ptr == MAP_FAILED {
        None
    } else {
        Some(ptr as *mut u8)
    }
}

/// Unmaps a region previously returned by [`allocate_region`].
///
/// Failures are intentionally ignored by callers: once a data page has been
/// unlinked from its record's page list it is unreachable, so there is
/// nothing left to roll back even if `munmap` fails.
pub unsafe fn free_region(ptr: *mut u8, size: usize) {
    munmap(ptr as *mut c_void, size);
}

/// Queries the OS virtual-memory page size.
pub fn query_page_size() -> usize {
    let size = unsafe { sysconf(_SC_PAGESIZE) };
    debug_assert!(size > 0, "sysconf(_SC_PAGESIZE) failed");
    size as usize
}
