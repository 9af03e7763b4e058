/*!
 * Locking Benchmarks
 * Stripe lookup and acquisition costs across hierarchy depths
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use xylem_locking::LockManager;

fn benchmark_stripe_lookup(c: &mut Criterion) {
    let manager = LockManager::new(100).unwrap();

    c.bench_function("stripe_lookup", |b| {
        b.iter(|| {
            let latch = manager
                .get_collection_latch(black_box("/db/colA/colB"))
                .unwrap();
            black_box(latch);
        })
    });
}

fn benchmark_read_acquisition(c: &mut Criterion) {
    let manager = LockManager::new(100).unwrap();
    let mut group = c.benchmark_group("read_lock");

    for depth in [1usize, 2, 4, 8] {
        let mut path = String::from("/db");
        for level in 0..depth {
            path.push_str(&format!("/col{level}"));
        }

        group.bench_with_input(BenchmarkId::from_parameter(depth), &path, |b, path| {
            b.iter(|| {
                let guard = manager.acquire_collection_read_lock(black_box(path)).unwrap();
                black_box(&guard);
            });
        });
    }

    group.finish();
}

fn benchmark_write_acquisition(c: &mut Criterion) {
    let manager = LockManager::new(100).unwrap();
    let mut group = c.benchmark_group("write_lock");

    for lock_parent in [false, true] {
        group.bench_with_input(
            BenchmarkId::new("depth2", lock_parent),
            &lock_parent,
            |b, &lock_parent| {
                b.iter(|| {
                    let guard = manager
                        .acquire_collection_write_lock(black_box("/db/colA"), lock_parent)
                        .unwrap();
                    black_box(&guard);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_stripe_lookup,
    benchmark_read_acquisition,
    benchmark_write_acquisition
);
criterion_main!(benches);
