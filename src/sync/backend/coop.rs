/*!
 * Cooperative Scheduler Hook
 *
 * Cooperative backends never park a kernel thread: whenever they would
 * block they hand control back to the user-level scheduler instead. The
 * embedding runtime installs its yield function here; until it does, a
 * yield maps onto `std::thread::yield_now`, which treats every kernel
 * thread as one user-level task.
 */

use parking_lot::{Once, RwLock};
use tracing::debug;

static YIELD_HOOK: RwLock<fn()> = parking_lot::const_rwlock(std::thread::yield_now as fn());

/// Install the scheduler's yield function
pub fn set_yield_hook(hook: fn()) {
    *YIELD_HOOK.write() = hook;
    debug!("Cooperative yield hook installed");
}

/// Restore the default yield (`std::thread::yield_now`)
pub fn reset_yield_hook() {
    *YIELD_HOOK.write() = std::thread::yield_now as fn();
}

/// Yield the current user-level task
#[inline]
pub fn yield_now() {
    let hook = *YIELD_HOOK.read();
    hook();
}

/// One-time runtime bring-up shared by the cooperative backends
pub(crate) struct Runtime {
    name: &'static str,
    once: Once,
}

impl Runtime {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self {
            name,
            once: Once::new(),
        }
    }

    #[inline]
    pub(crate) fn ensure_init(&self) {
        self.once.call_once(|| {
            debug!(backend = self.name, "Cooperative runtime initialized");
        });
    }

    #[inline]
    pub(crate) fn is_initialized(&self) -> bool {
        self.once.state().done()
    }
}
