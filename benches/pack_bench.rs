use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pacc::{load, EntryMeta, PacWriter, WriterOptions};

fn build(count: usize, size: usize) -> Vec<u8> {
    let data = vec![42u8; size];
    let mut writer = PacWriter::new(WriterOptions::new().with_target("bench"));
    writer.begin().unwrap();
    for i in 0..count {
        writer.add_entry(EntryMeta::new(format!("/file_{i}.bin")), black_box(&data)).unwrap();
    }
    writer.finalize().unwrap()
}

fn bench_pack(c: &mut Criterion) {
    c.bench_function("pack_1x1mb", |b| b.iter(|| build(1, 1024 * 1024)));
    c.bench_function("pack_1000x1kb", |b| b.iter(|| build(1000, 1024)));
}

fn bench_load(c: &mut Criterion) {
    let large = build(1, 1024 * 1024);
    let many = build(1000, 1024);

    c.bench_function("load_1x1mb", |b| b.iter(|| load(black_box(&large)).unwrap()));
    c.bench_function("load_1000x1kb", |b| b.iter(|| load(black_box(&many)).unwrap()));
}

fn bench_lookup(c: &mut Criterion) {
    let archive = load(&build(1000, 16)).unwrap();
    c.bench_function("lookup_last_of_1000", |b| {
        b.iter(|| archive.get_entry_by_path(black_box("/file_999.bin")).unwrap())
    });
}

criterion_group!(benches, bench_pack, bench_load, bench_lookup);
criterion_main!(benches);
