//! The record registry (§4.2): the stack of fixed-capacity registry pages
//! holding every named record descriptor for the lifetime of an [`Allocator`].
//!
//! Descriptors never move once registered — callers keep raw pointers to
//! them (a [`DataPage`](crate::page::DataPage) stores one) — so registry
//! pages are themselves never reallocated, only appended to as a singly
//! linked stack.

use crate::constants::{MAX_NAME, MAX_RECORDS_PER_PAGE};
use crate::freelist::FreeBlockIndex;
use crate::page::DataPage;
use crate::page_source::PageSource;
use core::fmt;
use core::ptr::NonNull;

/// A registered record type: its name, the block size it allocates, and the
/// bookkeeping the engine needs to serve `xcalloc`/`xfree` for it.
///
/// Embedding the page list head and free-block index directly in the
/// descriptor (rather than in a side table keyed by name or pointer) mirrors
/// how this codebase's other intrusive structures keep bookkeeping next to
/// the data it describes, and means a descriptor pointer alone is enough to
/// serve an allocation.
#[repr(C)]
pub struct RecordDescriptor {
    name: [u8; MAX_NAME],
    name_len: u8,
    /// Bytes of payload a block of this record holds.
    pub size: usize,
    /// Head of this record's list of mapped data pages.
    pub pages: Option<NonNull<DataPage>>,
    /// This record's free-block index, ordered by size descending.
    pub free_index: FreeBlockIndex,
}

impl RecordDescriptor {
    /// The record's name. Always valid UTF-8: registration rejects anything
    /// else.
    pub fn name(&self) -> &str {
        // Safety: only `Registry::register` constructs this field, always
        // from a validated `&str` slice of this same length.
        unsafe { core::str::from_utf8_unchecked(&self.name[..self.name_len as usize]) }
    }
}

/// One fixed-capacity page of descriptors, plus a link to the page
/// registered before it.
///
/// Carries no fill counter of its own: only the head page (tracked by
/// [`Registry::current_used`]) is ever partially filled, since a new page is
/// pushed the moment the current head fills up, so every non-head page is
/// full by construction. This keeps `size_of::<RegistryPage>()` exactly the
/// one-pointer-plus-array layout [`MAX_RECORDS_PER_PAGE`] was derived from.
#[repr(C)]
struct RegistryPage {
    next: Option<NonNull<RegistryPage>>,
    records: [core::mem::MaybeUninit<RecordDescriptor>; MAX_RECORDS_PER_PAGE],
}

impl RegistryPage {
    unsafe fn init(at: NonNull<RegistryPage>, next: Option<NonNull<RegistryPage>>) {
        (*at.as_ptr()).next = next;
    }
}

/// Why [`Registry::register`] refused a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// `size` is zero, or large enough that no page could ever host a block
    /// of this record plus its header.
    Oversized,
    /// A record with this name is already registered.
    Duplicate,
    /// `name` is longer than [`MAX_NAME`] bytes.
    NameTooLong,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::Oversized => write!(f, "record size does not fit in a single page"),
            RegisterError::Duplicate => write!(f, "a record with this name is already registered"),
            RegisterError::NameTooLong => write!(f, "record name exceeds {MAX_NAME} bytes"),
        }
    }
}

impl std::error::Error for RegisterError {}

/// The registry: a stack of [`RegistryPage`]s, most-recently-registered
/// first.
pub struct Registry {
    head: Option<NonNull<RegistryPage>>,
    /// Filled slots in `head`. Every page beneath it is full.
    current_used: usize,
    page_size: usize,
}

impl Registry {
    pub fn new(page_size: usize) -> Self {
        Self { head: None, current_used: 0, page_size }
    }

    /// Registers a new record type, allocating a fresh registry page via
    /// `source` if the current one is full or none exists yet.
    ///
    /// Returns a stable pointer to the new descriptor. The pointer remains
    /// valid for the registry's lifetime.
    pub fn register<S: PageSource>(
        &mut self,
        source: &S,
        name: &str,
        size: usize,
    ) -> Result<NonNull<RecordDescriptor>, RegisterError> {
        if name.len() > MAX_NAME {
            return Err(RegisterError::NameTooLong);
        }
        if size == 0 || size > self.page_size {
            return Err(RegisterError::Oversized);
        }
        if self.lookup(name).is_some() {
            return Err(RegisterError::Duplicate);
        }

        let needs_new_page = self.head.is_none() || self.current_used == MAX_RECORDS_PER_PAGE;

        if needs_new_page {
            self.push_page(source)?;
            self.current_used = 0;
        }

        // Safety: `push_page` guarantees `self.head` is `Some` on success;
        // if it wasn't needed, the existing head has room by the check above.
        let mut page = self.head.expect("registry page must exist after push_page");
        unsafe {
            let page_mut = page.as_mut();
            let slot = self.current_used;
            let descriptor_ptr = page_mut.records[slot].as_mut_ptr();

            let mut name_buf = [0u8; MAX_NAME];
            name_buf[..name.len()].copy_from_slice(name.as_bytes());
            descriptor_ptr.write(RecordDescriptor {
                name: name_buf,
                name_len: name.len() as u8,
                size,
                pages: None,
                free_index: FreeBlockIndex::new(),
            });

            self.current_used += 1;
            Ok(NonNull::new_unchecked(descriptor_ptr))
        }
    }

    /// Finds a registered record by name.
    pub fn lookup(&self, name: &str) -> Option<NonNull<RecordDescriptor>> {
        for descriptor in self.iter_raw() {
            if unsafe { descriptor.as_ref().name() == name } {
                return Some(descriptor);
            }
        }
        None
    }

    /// Iterates every registered descriptor, most recently registered first.
    pub fn iter(&self) -> RegistryIter<'_> {
        RegistryIter {
            inner: self.iter_raw(),
            _marker: core::marker::PhantomData,
        }
    }

    fn iter_raw(&self) -> RawRegistryIter {
        RawRegistryIter {
            page: self.head,
            slot: 0,
            slots_in_page: self.current_used,
        }
    }

    fn push_page<S: PageSource>(&mut self, source: &S) -> Result<(), RegisterError> {
        let base = source.acquire(self.page_size, 1).ok_or(RegisterError::Oversized)?;
        let page = base.cast::<RegistryPage>();
        // The new page becomes the new head *before* it is populated, so the
        // slot handed back to the caller always belongs to `self.head`
        // rather than a page that is about to be superseded.
        unsafe {
            RegistryPage::init(page, self.head);
        }
        self.head = Some(page);
        Ok(())
    }
}

/// Walks registry pages yielding raw descriptor pointers. The head page
/// stops after `slots_in_page` entries; every page beneath it is full.
struct RawRegistryIter {
    page: Option<NonNull<RegistryPage>>,
    slot: usize,
    slots_in_page: usize,
}

impl Iterator for RawRegistryIter {
    type Item = NonNull<RecordDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page = self.page?;
            let page_ref = unsafe { page.as_ref() };
            if self.slot < self.slots_in_page {
                let descriptor = unsafe { page_ref.records[self.slot].as_ptr() as *mut RecordDescriptor };
                self.slot += 1;
                return NonNull::new(descriptor);
            }
            self.page = page_ref.next;
            self.slot = 0;
            self.slots_in_page = MAX_RECORDS_PER_PAGE;
        }
    }
}

pub struct RegistryIter<'a> {
    inner: RawRegistryIter,
    _marker: core::marker::PhantomData<&'a Registry>,
}

impl<'a> Iterator for RegistryIter<'a> {
    type Item = &'a RecordDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|ptr| unsafe { &*ptr.as_ptr() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_source::HeapPageSource;

    #[test]
    fn register_and_lookup_roundtrip() {
        let source = HeapPageSource;
        let mut registry = Registry::new(4096);
        let ptr = registry.register(&source, "widget", 64).unwrap();
        let found = registry.lookup("widget").unwrap();
        assert_eq!(ptr, found);
        assert_eq!(unsafe { found.as_ref().size }, 64);
        assert_eq!(unsafe { found.as_ref().name() }, "widget");
    }

    #[test]
    fn rejects_duplicate_names() {
        let source = HeapPageSource;
        let mut registry = Registry::new(4096);
        registry.register(&source, "widget", 64).unwrap();
        assert_eq!(registry.register(&source, "widget", 128), Err(RegisterError::Duplicate));
    }

    #[test]
    fn rejects_oversized_and_too_long_names() {
        let source = HeapPageSource;
        let mut registry = Registry::new(4096);
        assert_eq!(registry.register(&source, "huge", 1 << 20), Err(RegisterError::Oversized));
        let long_name = "x".repeat(MAX_NAME + 1);
        assert_eq!(registry.register(&source, &long_name, 8), Err(RegisterError::NameTooLong));
    }

    #[test]
    fn spills_into_a_second_registry_page_once_full() {
        let source = HeapPageSource;
        let mut registry = Registry::new(4096);
        for i in 0..MAX_RECORDS_PER_PAGE + 1 {
            let name = format!("r{i}");
            registry.register(&source, &name, 8).unwrap();
        }
        assert_eq!(registry.iter().count(), MAX_RECORDS_PER_PAGE + 1);
        assert!(registry.lookup(&format!("r{}", MAX_RECORDS_PER_PAGE)).is_some());
        assert!(registry.lookup("r0").is_some());
    }
}
