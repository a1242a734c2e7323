use criterion::{black_box, criterion_group, criterion_main, Criterion};
use recordmem::engine::Allocator;
use recordmem::page_source::HeapPageSource;

fn bench_single_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("xcalloc single record");
    group.sample_size(20);
    const BATCH: usize = 200;

    group.bench_function("alloc/free cycle, no page pressure", |b| {
        let mut alloc = Allocator::with_page_size(HeapPageSource, 1 << 20);
        alloc.register("widget", 64).unwrap();
        b.iter(|| {
            let mut ptrs = Vec::with_capacity(BATCH);
            unsafe {
                for _ in 0..BATCH {
                    ptrs.push(black_box(alloc.xcalloc("widget", 1)));
                }
                for ptr in ptrs {
                    alloc.xfree(ptr);
                }
            }
        });
    });

    group.bench_function("alloc/free cycle, tight pages (frequent split+merge)", |b| {
        let mut alloc = Allocator::with_page_size(HeapPageSource, 512);
        alloc.register("widget", 64).unwrap();
        b.iter(|| {
            let mut ptrs = Vec::with_capacity(BATCH);
            unsafe {
                for _ in 0..BATCH {
                    ptrs.push(black_box(alloc.xcalloc("widget", 1)));
                }
                for ptr in ptrs {
                    alloc.xfree(ptr);
                }
            }
        });
    });
}

fn bench_many_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("xcalloc many records");
    group.sample_size(20);

    group.bench_function("round robin over 16 record types", |b| {
        let mut alloc = Allocator::with_page_size(HeapPageSource, 1 << 16);
        let names: Vec<String> = (0..16).map(|i| format!("r{i}")).collect();
        for (i, name) in names.iter().enumerate() {
            alloc.register(name, 32 + i * 8).unwrap();
        }
        b.iter(|| unsafe {
            let mut ptrs = Vec::with_capacity(names.len());
            for name in &names {
                ptrs.push(black_box(alloc.xcalloc(name, 1)));
            }
            for ptr in ptrs {
                alloc.xfree(ptr);
            }
        });
    });
}

criterion_group!(benches, bench_single_page, bench_many_records);
criterion_main!(benches);
