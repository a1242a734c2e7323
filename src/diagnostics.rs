//! Read-only introspection over a registry (§4.6, ambient).
//!
//! Everything here is pull-based: nothing in [`crate::engine`] logs on its
//! own behalf. Callers ask for a summary or a dump when they want one, the
//! same way `mm_print_registered_struct_records`, `mm_print_mem_usage` and
//! `mm_print_block_usage` were invoked on demand in the original allocator.

use crate::block::BlockStatus;
use crate::page::DataPage;
use crate::registry::RecordDescriptor;
use tracing::info;

/// Aggregate stats for one registered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub name: String,
    pub record_size: usize,
    pub page_count: usize,
    pub free_blocks: usize,
    pub allocated_blocks: usize,
    pub free_bytes: usize,
    pub allocated_bytes: usize,
}

/// One block's position and state, for a per-record dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    /// Byte offset of this block's header within its hosting page.
    pub offset: usize,
    pub size: usize,
    pub status: BlockStatus,
}

/// Walks every page and block belonging to `record` and totals them up.
///
/// # Safety
/// `record`'s page list and each page's block list must be well-formed (the
/// invariant the engine maintains between calls).
pub unsafe fn summarize(record: &RecordDescriptor) -> RecordSummary {
    let mut summary = RecordSummary {
        name: record.name().to_owned(),
        record_size: record.size,
        page_count: 0,
        free_blocks: 0,
        allocated_blocks: 0,
        free_bytes: 0,
        allocated_bytes: 0,
    };

    let mut page_cursor = record.pages;
    while let Some(page) = page_cursor {
        summary.page_count += 1;
        let mut block_cursor = Some(DataPage::first_block(page));
        while let Some(block) = block_cursor {
            let header = block.as_ref();
            match header.status {
                BlockStatus::Free => {
                    summary.free_blocks += 1;
                    summary.free_bytes += header.data_block_size;
                }
                BlockStatus::Allocated => {
                    summary.allocated_blocks += 1;
                    summary.allocated_bytes += header.data_block_size;
                }
            }
            block_cursor = header.next;
        }
        page_cursor = page.as_ref().next;
    }

    summary
}

/// Dumps every block of `record`, in page-list then linear-list order.
///
/// # Safety
/// Same as [`summarize`].
pub unsafe fn blocks(record: &RecordDescriptor) -> Vec<BlockRecord> {
    let mut out = Vec::new();
    let mut page_cursor = record.pages;
    while let Some(page) = page_cursor {
        let mut block_cursor = Some(DataPage::first_block(page));
        while let Some(block) = block_cursor {
            let header = block.as_ref();
            out.push(BlockRecord {
                offset: header.offset,
                size: header.data_block_size,
                status: header.status,
            });
            block_cursor = header.next;
        }
        page_cursor = page.as_ref().next;
    }
    out
}

/// Logs a one-line summary for every registered record.
///
/// # Safety
/// Same as [`summarize`], for every yielded record.
pub unsafe fn log_registered_records<'a>(records: impl Iterator<Item = &'a RecordDescriptor>) {
    for record in records {
        let summary = summarize(record);
        info!(
            name = %summary.name,
            record_size = summary.record_size,
            pages = summary.page_count,
            free_blocks = summary.free_blocks,
            allocated_blocks = summary.allocated_blocks,
            "registered record"
        );
    }
}

/// Logs aggregate memory usage across every registered record.
///
/// # Safety
/// Same as [`summarize`], for every yielded record.
pub unsafe fn log_memory_usage<'a>(records: impl Iterator<Item = &'a RecordDescriptor>, page_size: usize) {
    let mut total_pages = 0usize;
    let mut total_free = 0usize;
    let mut total_allocated = 0usize;
    for record in records {
        let summary = summarize(record);
        total_pages += summary.page_count;
        total_free += summary.free_bytes;
        total_allocated += summary.allocated_bytes;
    }
    info!(
        total_pages,
        total_bytes_mapped = total_pages * page_size,
        total_free,
        total_allocated,
        "aggregate memory usage"
    );
}

/// Logs every block of a single record.
///
/// # Safety
/// Same as [`summarize`].
pub unsafe fn log_block_usage(record: &RecordDescriptor) {
    for block in blocks(record) {
        info!(offset = block.offset, size = block.size, status = ?block.status, "block");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Allocator;
    use crate::page_source::HeapPageSource;

    #[test]
    fn summary_counts_match_live_allocations() {
        let mut alloc = Allocator::with_page_size(HeapPageSource, 4096);
        alloc.register("widget", 64).unwrap();
        unsafe {
            let a = alloc.xcalloc("widget", 1);
            let b = alloc.xcalloc("widget", 1);
            alloc.xfree(b);

            let record = alloc.lookup("widget").unwrap();
            let summary = summarize(record.as_ref());
            assert_eq!(summary.allocated_blocks, 1);
            assert_eq!(summary.page_count, 1);

            alloc.xfree(a);
        }
    }
}
