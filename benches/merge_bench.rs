// Criterion benchmarks for ConfigModel merging and queue admission.
//
// Every queued job stores a merged copy of the working configuration, so
// merge cost is paid once per added file.

use criterion::{Criterion, criterion_group, criterion_main};
use docfmt::models::{ConfigModel, DocumentFile};
use docfmt::presets::PresetCatalog;
use docfmt::queue::JobQueue;
use std::hint::black_box;

fn overrides() -> ConfigModel {
    ConfigModel::from_assignments([
        "text.font_size=12",
        "text.font_family=Georgia",
        "paragraph.spacing_after=4",
        "page.margin_left=1.25",
        "cleanup.normalize_formatting=true",
    ])
    .unwrap_or_default()
}

fn bench_merge(c: &mut Criterion) {
    let base = PresetCatalog::builtin().resolve("report");
    let patch = overrides();

    c.bench_function("merge (report preset + 5 overrides)", |b| {
        b.iter(|| black_box(black_box(&base).merge(black_box(&patch))));
    });

    c.bench_function("merge (empty patch)", |b| {
        let empty = ConfigModel::empty();
        b.iter(|| black_box(black_box(&base).merge(black_box(&empty))));
    });
}

fn bench_queue_add(c: &mut Criterion) {
    let config = PresetCatalog::builtin()
        .resolve("professional")
        .merge(&overrides());
    let files: Vec<DocumentFile> = (0..10)
        .map(|i| DocumentFile::from_bytes(format!("doc{}.docx", i), vec![0u8; 256]))
        .collect();

    c.bench_function("queue add (10 files)", |b| {
        b.iter(|| {
            let queue = JobQueue::new();
            black_box(queue.add(files.clone(), &config));
        });
    });
}

criterion_group!(benches, bench_merge, bench_queue_add);
criterion_main!(benches);
