use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use reslock_core::LockRegistry;
use reslock_core::clock::ManualClock;
use reslock_core::infrastructure_in_memory::InMemoryOrderedStore;
use reslock_core::types::ResourceType;

fn bench_sweep_expired(c: &mut Criterion) {
    let order = ResourceType::new("Order").unwrap();

    c.bench_function("sweep_1000_expired_holders", |b| {
        b.iter(|| {
            let clock = ManualClock::new(1_000);
            let store = InMemoryOrderedStore::with_clock(Arc::new(clock.clone()));
            let registry = LockRegistry::new(Arc::new(store)).with_clock(Arc::new(clock.clone()));

            // One long-lived holder keeps the collection's deadline ahead of
            // the short ones, so the sweep (not the deadline) reaps them.
            registry
                .acquire_for(&order, 42, "keeper", Duration::from_secs(3600))
                .unwrap();
            for user in 0..1000 {
                registry
                    .acquire_for(&order, 42, user, Duration::from_secs(1))
                    .unwrap();
            }

            clock.advance(Duration::from_secs(2));
            black_box(registry.sweep(&order, Some("42")).unwrap().total())
        })
    });
}

criterion_group!(benches, bench_sweep_expired);
criterion_main!(benches);
