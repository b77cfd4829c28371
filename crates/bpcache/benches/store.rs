use std::path::Path;
use std::sync::Arc;

use blueprintfs::{Blueprint, FileSystem, MemoryFs, BLUEPRINT_FILE_NAME};
use bpcache::{Store, StoreConfig, TypedContent};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn blueprint(size: usize) -> TypedContent {
    let fs = Arc::new(MemoryFs::new());
    let root = Path::new("/bp");
    fs.create_dir_all(root).unwrap();
    fs.write(
        &root.join(BLUEPRINT_FILE_NAME),
        b"apiVersion: landscaper.gardener.cloud/v1alpha1\nkind: Blueprint\n",
    )
    .unwrap();
    fs.write(&root.join("data"), &vec![b'x'; size]).unwrap();
    TypedContent::blueprint(Blueprint::from_path(fs, root).unwrap())
}

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_hit", |b| {
        let store = Store::unbounded_in_memory();
        let content = blueprint(1024);

        let keys: Vec<String> = (0..100).map(|i| format!("bp{}", i)).collect();
        for key in &keys {
            store.put(key, &content).unwrap();
        }

        let mut counter = 0;
        b.iter(|| {
            black_box(store.get(&keys[counter % 100]).unwrap());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_mixed_50_50(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("50_get_50_put_bounded", |b| {
        let config = StoreConfig::new("/store", "256Ki");
        let store = Store::open(Arc::new(MemoryFs::new()), &config).unwrap();
        let content = blueprint(1024);

        let keys: Vec<String> = (0..100).map(|i| format!("bp{}", i)).collect();
        for key in &keys {
            store.put(key, &content).unwrap();
        }

        let mut counter = 0u64;
        b.iter(|| {
            let key = &keys[(counter as usize) % 100];
            if counter % 2 == 0 {
                black_box(store.get(key).ok());
            } else {
                black_box(store.put(key, &content).ok());
            }
            counter += 1;
        });
    });

    group.finish();
}

fn bench_gc(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc");
    group.sample_size(20);

    group.bench_function("priority_list_1000_entries", |b| {
        let store = Store::unbounded_in_memory();
        let content = blueprint(16);
        for i in 0..1000 {
            store.put(&format!("bp{}", i), &content).unwrap();
        }

        b.iter(|| {
            black_box(store.priority_list());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_mixed_50_50, bench_gc);
criterion_main!(benches);
