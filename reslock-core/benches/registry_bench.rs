use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use reslock_core::LockRegistry;
use reslock_core::types::ResourceType;

fn bench_acquire_release(c: &mut Criterion) {
    let registry = LockRegistry::in_memory();
    let order = ResourceType::new("Order").unwrap();

    c.bench_function("acquire_release_cycle", |b| {
        b.iter(|| {
            registry.acquire(&order, 42, 7).unwrap();
            registry.release(&order, 42, 7).unwrap();
        })
    });
}

fn bench_holders(c: &mut Criterion) {
    let mut group = c.benchmark_group("holders");
    let order = ResourceType::new("Order").unwrap();

    for holder_count in [1, 10, 100] {
        let registry = LockRegistry::in_memory();
        for user in 0..holder_count {
            registry.acquire(&order, 42, user).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::new("users", holder_count),
            &holder_count,
            |b, _| b.iter(|| black_box(registry.holders(&order, 42).unwrap().len())),
        );
    }

    group.finish();
}

fn bench_locked_resources(c: &mut Criterion) {
    let mut group = c.benchmark_group("locked_resources");
    let order = ResourceType::new("Order").unwrap();

    for resource_count in [10, 100, 1000] {
        let registry = LockRegistry::in_memory();
        for id in 0..resource_count {
            registry.acquire(&order, id, "u1").unwrap();
        }

        group.bench_with_input(
            BenchmarkId::new("resources", resource_count),
            &resource_count,
            |b, _| b.iter(|| black_box(registry.locked_resources(&order).unwrap().len())),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_acquire_release, bench_holders, bench_locked_resources);
criterion_main!(benches);
