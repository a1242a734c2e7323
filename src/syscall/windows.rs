#![cfg(windows)]

use windows_sys::Win32::System::Memory::{VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE};
use windows_sys::Win32::System::SystemInformation::GetSystemInfo;
use std::mem::MaybeUninit;
use std::ptr;

/// Reserves and commits `size` bytes of zero-filled memory.
///
/// Returns `None` if the call fails.
pub unsafe fn allocate_region(size: usize) -> Option<*mut u8> {
    let ptr = VirtualAlloc(ptr::null_mut(), size, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE);
    if ptr.is_null() {
        None
    } else {
        Some(ptr as *mut u8)
    }
}

/// Releases a region previously returned by [`allocate_region`].
///
/// `VirtualFree` with `MEM_RELEASE` requires a size of zero and always frees
/// the entire region that was reserved. Failures are ignored for the same
/// reason as on Unix: the caller has already unlinked the page.
pub unsafe fn free_region(ptr: *mut u8, _size: usize) {
    VirtualFree(ptr as *mut _, 0, MEM_RELEASE);
}

/// Queries the OS virtual-memory page size.
pub fn query_page_size() -> usize {
    unsafe {
        let mut info = MaybeUninit::uninit();
        GetSystemInfo(info.as_mut_ptr());
        info.assume_init().dwPageSize as usize
    }
}
