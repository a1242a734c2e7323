//! Layout constants shared across the registry and allocation engine.

use crate::registry::RecordDescriptor;
use core::mem::size_of;

/// Maximum length, in bytes, of a record name (not counting a trailing NUL).
pub const MAX_NAME: usize = 32;

/// The page size assumed when sizing compile-time layout constants.
///
/// The allocator queries the real OS page size once at startup (see
/// [`crate::syscall::query_page_size`]) and uses that value for every page
/// mapping. `ASSUMED_PAGE_SIZE` only bounds [`MAX_RECORDS_PER_PAGE`]; every
/// platform this crate targets reports a page size of at least this many
/// bytes, so the bound is never exceeded in practice.
pub const ASSUMED_PAGE_SIZE: usize = 4096;

/// Capacity of a single registry page's descriptor array.
///
/// Derived from `(ASSUMED_PAGE_SIZE - pointer size) / size_of::<RecordDescriptor>()`,
/// matching the bound in the external interface contract.
pub const MAX_RECORDS_PER_PAGE: usize =
    (ASSUMED_PAGE_SIZE - size_of::<usize>()) / size_of::<RecordDescriptor>();

const _: () = assert!(MAX_RECORDS_PER_PAGE > 0, "a registry page must hold at least one record");
