/*!
 * Adaptive Spin-Wait Backoff
 *
 * Optimized for waits that are expected to be very short, such as the
 * signaling window of a wait-sync release or a contended cooperative lock.
 *
 * # Design: Exponential Backoff Over Linear Spinning
 *
 * 1. **Tight spin phase**: an exponentially growing burst of `spin_loop()`
 *    hints, up to the configured spin limit
 * 2. **Yield phase**: hand the execution context back to the backend's
 *    scheduler on every further step
 *
 * There is no sleep phase: under a cooperative backend sleeping would stall
 * every task multiplexed on the kernel thread.
 */

use super::traits::Backend;
use crate::core::context;
use crate::core::limits::SPIN_STEP_SHIFT_MAX;

/// Exponential backoff for spin loops
#[derive(Debug)]
pub struct Backoff {
    step: u32,
    limit: u32,
}

impl Backoff {
    /// Create a backoff using the process-wide spin limit
    #[inline]
    pub fn new() -> Self {
        Self::with_limit(context::spin_limit())
    }

    /// Create a backoff that yields after `limit` tight-spin steps
    #[inline]
    pub const fn with_limit(limit: u32) -> Self {
        Self { step: 0, limit }
    }

    /// Spin without ever yielding
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..1u32 << self.step.min(SPIN_STEP_SHIFT_MAX) {
            std::hint::spin_loop();
        }
        self.step = self.step.saturating_add(1);
    }

    /// Spin while under the limit, then yield through backend `B`
    #[inline]
    pub fn snooze<B: Backend>(&mut self) {
        if self.step < self.limit {
            self.spin();
        } else {
            B::yield_now();
            self.step = self.step.saturating_add(1);
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
