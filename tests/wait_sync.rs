/*!
 * Wait-Sync Integration Tests
 *
 * Completion semantics across backends and wait modes.
 */

use hpc_sync::monitoring::try_init_test_tracing;
use hpc_sync::sync::{Backend, Feb, Kernel, Tasklet};
use hpc_sync::{NoProgress, WaitMode, WaitSync, WaitSyncList, STATUS_SUCCESS};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Three producers finishing at different times; the owner wakes once the
/// slowest one is done, well before the delays would add up.
fn end_to_end_three<B: Backend>() {
    try_init_test_tracing();
    let sync = Arc::new(WaitSync::<B>::with_mode(3, WaitMode::Blocking).unwrap());
    let delays = [10u64, 100, 200];
    let slowest = Duration::from_millis(200);
    let summed = Duration::from_millis(delays.iter().sum());
    let start = Instant::now();

    let producers: Vec<_> = delays
        .iter()
        .map(|&ms| {
            let sync = sync.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(ms));
                sync.update(1, STATUS_SUCCESS).unwrap();
            })
        })
        .collect();

    assert_eq!(sync.wait(&mut NoProgress), Ok(STATUS_SUCCESS));
    let elapsed = start.elapsed();
    assert!(elapsed >= slowest);
    assert!(elapsed < summed, "waited {elapsed:?}, producers ran serially");
    assert_eq!(sync.count(), 0);

    for producer in producers {
        producer.join().unwrap();
    }
    unsafe { sync.release() };
    assert!(!sync.is_signaling());
}

fn zero_count_immediate<B: Backend>() {
    for mode in [WaitMode::Blocking, WaitMode::Polling] {
        let sync = WaitSync::<B>::with_mode(0, mode).unwrap();
        let mut calls = 0usize;
        let mut engine = || {
            calls += 1;
            0usize
        };
        assert_eq!(sync.wait(&mut engine), Ok(STATUS_SUCCESS));
        assert_eq!(calls, 0);
        unsafe { sync.release() };
    }
}

fn polling_with_remote_producers<B: Backend>() {
    let sync = Arc::new(WaitSync::<B>::with_mode(4, WaitMode::Polling).unwrap());
    let polls = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..2)
        .map(|_| {
            let sync = sync.clone();
            thread::spawn(move || {
                sync.update(1, STATUS_SUCCESS).unwrap();
                sync.update(1, STATUS_SUCCESS).unwrap();
            })
        })
        .collect();

    let counter = polls.clone();
    let mut engine = move || {
        counter.fetch_add(1, Ordering::Relaxed);
        0usize
    };
    assert_eq!(sync.wait(&mut engine), Ok(STATUS_SUCCESS));
    for producer in producers {
        producer.join().unwrap();
    }
    unsafe { sync.release() };
}

fn error_status_short_circuits<B: Backend>() {
    let sync = Arc::new(WaitSync::<B>::with_mode(10, WaitMode::Blocking).unwrap());
    let failing = {
        let sync = sync.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sync.update(1, -42).unwrap();
        })
    };
    assert_eq!(sync.wait(&mut NoProgress), Ok(-42));
    failing.join().unwrap();

    // late producers find the count drained and do not signal again
    sync.update(1, -1).unwrap();
    assert_eq!(sync.status(), -1);
    unsafe { sync.release() };
}

macro_rules! per_backend {
    ($($name:ident => $helper:ident),* $(,)?) => {
        mod kernel {
            use super::*;
            $(#[test] fn $name() { $helper::<Kernel>(); })*
        }
        mod tasklet {
            use super::*;
            $(#[test] fn $name() { $helper::<Tasklet>(); })*
        }
        mod feb {
            use super::*;
            $(#[test] fn $name() { $helper::<Feb>(); })*
        }
    };
}

per_backend! {
    test_end_to_end_three_producers => end_to_end_three,
    test_zero_count_immediate => zero_count_immediate,
    test_polling_with_remote_producers => polling_with_remote_producers,
    test_error_status_short_circuits => error_status_short_circuits,
}

#[test]
fn test_pool_reuse_through_list() {
    let list = WaitSyncList::<Kernel>::const_new();
    let mut pool: Vec<WaitSync<Kernel>> = (0..3)
        .map(|_| WaitSync::with_mode(0, WaitMode::Polling).unwrap())
        .collect();

    for round in 1..=3 {
        for sync in pool.iter_mut() {
            sync.init_with_mode(round, WaitMode::Polling).unwrap();
        }
        for sync in &pool {
            unsafe { list.push(sync).unwrap() };
        }
        assert_eq!(list.len(), 3);

        list.for_each(|sync| sync.update(sync.count(), STATUS_SUCCESS).unwrap())
            .unwrap();

        for sync in &pool {
            assert_eq!(sync.wait(&mut NoProgress), Ok(STATUS_SUCCESS));
            assert!(list.remove(sync).unwrap());
        }
        assert!(list.is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// However the completions are split, only the last one signals and
    /// the owner sees success
    #[test]
    fn prop_update_splits_drain_exactly(splits in prop::collection::vec(1i32..5, 1..12)) {
        let total: i32 = splits.iter().sum();
        let sync = WaitSync::<Kernel>::with_mode(total, WaitMode::Polling).unwrap();
        prop_assert!(sync.is_signaling());

        for (i, &step) in splits.iter().enumerate() {
            sync.update(step, STATUS_SUCCESS).unwrap();
            let last = i + 1 == splits.len();
            prop_assert_eq!(sync.is_signaling(), !last);
        }
        prop_assert_eq!(sync.count(), 0);
        prop_assert_eq!(sync.wait(&mut NoProgress), Ok(STATUS_SUCCESS));
    }
}
