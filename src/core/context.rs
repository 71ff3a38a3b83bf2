/*!
 * Execution Contexts
 *
 * Identity of the calling execution context plus the process-wide flags the
 * synchronization layer consults: the designated main context, whether
 * thread support is active, and call-site debugging.
 */

use super::limits::DEFAULT_SPIN_LIMIT;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Identifier of an execution context (kernel thread or user-level thread)
///
/// Never reused within a process, so it is safe to compare against stale
/// owner records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(NonZeroUsize);

impl ContextId {
    /// Raw value, always non-zero
    #[inline(always)]
    pub fn as_usize(self) -> usize {
        self.0.get()
    }
}

static NEXT_CONTEXT: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static CURRENT: ContextId = ContextId(
        NonZeroUsize::new(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
            .unwrap_or(NonZeroUsize::MIN),
    );
}

/// Identifier of the calling context
#[inline]
pub fn current() -> ContextId {
    CURRENT.with(|id| *id)
}

// =============================================================================
// MAIN CONTEXT
// =============================================================================

static MAIN_CONTEXT: AtomicUsize = AtomicUsize::new(0);

/// Mark the calling context as the process's main context
///
/// Must run before creating TSD keys whose destructors should be replayed by
/// `keys_destruct` at shutdown.
pub fn set_main() {
    let me = current();
    let prev = MAIN_CONTEXT.swap(me.as_usize(), Ordering::AcqRel);
    if prev != 0 && prev != me.as_usize() {
        warn!(previous = prev, current = me.as_usize(), "Main context reassigned");
    }
    debug!(context = me.as_usize(), "Main context set");
}

/// Whether the calling context is the designated main context
#[inline]
pub fn is_main() -> bool {
    MAIN_CONTEXT.load(Ordering::Acquire) == current().as_usize()
}

// =============================================================================
// THREADING FLAGS
// =============================================================================

static USING_THREADS: AtomicBool = AtomicBool::new(false);
static DEBUG_THREADS: AtomicBool = AtomicBool::new(false);
static SPIN_LIMIT: AtomicU32 = AtomicU32::new(DEFAULT_SPIN_LIMIT);

/// Whether thread support is compiled in
#[inline(always)]
pub const fn threads_supported() -> bool {
    cfg!(feature = "threads")
}

/// Whether multi-threaded operation is active
///
/// Always false when thread support is not compiled in.
#[inline]
pub fn using_threads() -> bool {
    threads_supported() && USING_THREADS.load(Ordering::Acquire)
}

/// Enable or disable multi-threaded operation
///
/// Returns the effective setting: enabling is ignored when thread support
/// is not compiled in.
pub fn set_using_threads(enabled: bool) -> bool {
    if enabled && !threads_supported() {
        warn!("Thread support not compiled in, staying single-threaded");
        return false;
    }
    USING_THREADS.store(enabled, Ordering::Release);
    enabled
}

/// Whether blocking locks log their call sites
#[inline]
pub fn debug_threads() -> bool {
    cfg!(debug_assertions) && DEBUG_THREADS.load(Ordering::Relaxed)
}

/// Toggle call-site logging (effective in debug builds only)
pub fn set_debug_threads(enabled: bool) {
    DEBUG_THREADS.store(enabled, Ordering::Relaxed);
}

/// Tight spins a backoff performs before yielding
#[inline]
pub fn spin_limit() -> u32 {
    SPIN_LIMIT.load(Ordering::Relaxed)
}

/// Override the backoff spin limit
pub fn set_spin_limit(limit: u32) {
    SPIN_LIMIT.store(limit, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::thread;

    #[test]
    fn test_context_ids_are_distinct() {
        let here = current();
        assert_eq!(here, current());

        let there = thread::spawn(current).join().unwrap();
        assert_ne!(here, there);
        assert_ne!(here.as_usize(), 0);
    }

    #[test]
    #[serial]
    fn test_main_context_is_per_thread() {
        let other = thread::spawn(|| {
            set_main();
            is_main()
        })
        .join()
        .unwrap();
        assert!(other);
        // The spawned thread holds the designation now
        assert!(!is_main());
    }
}
