/*!
 * Synchronization Primitives Benchmarks
 *
 * Uncontended lock/unlock per backend, the atomic fast path, and a
 * wait-sync completion round trip.
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hpc_sync::sync::{Backend, Feb, Kernel, Mutex, Tasklet};
use hpc_sync::{NoProgress, WaitMode, WaitSync, STATUS_SUCCESS};
use std::sync::Arc;
use std::thread;

fn lock_unlock<B: Backend>(c: &mut Criterion, group: &str) {
    let mutex = Mutex::<B>::const_new(false);
    mutex.create().unwrap();

    c.bench_function(&format!("{group}/lock_unlock/{}", B::NAME), |b| {
        b.iter(|| {
            mutex.lock().unwrap();
            black_box(&mutex);
            mutex.unlock().unwrap();
        });
    });
}

fn bench_lock_unlock(c: &mut Criterion) {
    lock_unlock::<Kernel>(c, "mutex");
    lock_unlock::<Tasklet>(c, "mutex");
    lock_unlock::<Feb>(c, "mutex");
}

fn bench_atomic_path(c: &mut Criterion) {
    let mutex = Mutex::<Kernel>::const_new(false);
    c.bench_function("mutex/atomic_lock_unlock", |b| {
        b.iter(|| {
            mutex.atomic_lock().unwrap();
            black_box(&mutex);
            mutex.atomic_unlock().unwrap();
        });
    });
}

fn bench_wait_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait_sync_round_trip");

    for mode in [WaitMode::Polling, WaitMode::Blocking] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", mode)),
            &mode,
            |b, &mode| {
                b.iter(|| {
                    let sync = Arc::new(WaitSync::<Kernel>::with_mode(1, mode).unwrap());
                    let producer = {
                        let sync = sync.clone();
                        thread::spawn(move || sync.update(1, STATUS_SUCCESS).unwrap())
                    };
                    black_box(sync.wait(&mut NoProgress).unwrap());
                    producer.join().unwrap();
                    unsafe { sync.release() };
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_lock_unlock, bench_atomic_path, bench_wait_sync);
criterion_main!(benches);
