/*!
 * Lazily Created Native Handles
 *
 * Statically initialized primitives carry no native object until first use.
 * The first context to need one builds a candidate and publishes it with a
 * compare-and-swap against the null sentinel; a context that loses the race
 * destroys its candidate and adopts the winner's.
 */

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use tracing::trace;

/// A native object created at most once, on demand
pub struct LazyHandle<T> {
    ptr: AtomicPtr<T>,
    _owns: PhantomData<Box<T>>,
}

// SAFETY: the handle owns a `T` shared by reference across contexts
unsafe impl<T: Send + Sync> Send for LazyHandle<T> {}
// SAFETY: publication goes through AcqRel CAS, readers only get `&T`
unsafe impl<T: Send + Sync> Sync for LazyHandle<T> {}

impl<T> LazyHandle<T> {
    /// An empty handle
    pub const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            _owns: PhantomData,
        }
    }

    /// The published object, if any
    #[inline]
    pub fn get(&self) -> Option<&T> {
        let p = self.ptr.load(Ordering::Acquire);
        // SAFETY: non-null pointers come from `Box::into_raw` and live until
        // `free` or drop
        unsafe { p.as_ref() }
    }

    /// The published object, creating it with `make` if none exists yet
    ///
    /// `make` may run in several racing contexts; exactly one result is
    /// kept and every other candidate is dropped.
    pub fn get_or_create(&self, make: impl Fn() -> T) -> &T {
        loop {
            if let Some(existing) = self.get() {
                return existing;
            }

            let candidate = Box::into_raw(Box::new(make()));
            match self.ptr.compare_exchange(
                ptr::null_mut(),
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                // SAFETY: we just published `candidate`
                Ok(_) => return unsafe { &*candidate },
                Err(_) => {
                    // SAFETY: `candidate` was never published
                    drop(unsafe { Box::from_raw(candidate) });
                    trace!("Lost native handle creation race");
                }
            }
        }
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        !self.ptr.load(Ordering::Acquire).is_null()
    }

    /// Destroy the published object, leaving the handle empty
    ///
    /// Returns whether an object was destroyed.
    ///
    /// # Safety
    ///
    /// No other context may hold a reference obtained from this handle.
    pub unsafe fn free(&self) -> bool {
        let p = self.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
        if p.is_null() {
            false
        } else {
            drop(Box::from_raw(p));
            true
        }
    }
}

impl<T> Default for LazyHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LazyHandle<T> {
    fn drop(&mut self) {
        let p = *self.ptr.get_mut();
        if !p.is_null() {
            // SAFETY: exclusive access; the pointer came from `Box::into_raw`
            drop(unsafe { Box::from_raw(p) });
        }
    }
}

impl<T> std::fmt::Debug for LazyHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyHandle")
            .field("created", &self.is_created())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    struct Tracked<'a> {
        drops: &'a AtomicUsize,
    }

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_created_once() {
        let handle = LazyHandle::new();
        assert!(handle.get().is_none());
        let a = handle.get_or_create(|| 7u32) as *const u32;
        let b = handle.get_or_create(|| 9u32) as *const u32;
        assert_eq!(a, b);
        assert_eq!(handle.get(), Some(&7));
    }

    #[test]
    fn test_free_then_recreate() {
        let drops = AtomicUsize::new(0);
        let handle = LazyHandle::new();
        handle.get_or_create(|| Tracked { drops: &drops });
        assert!(unsafe { handle.free() });
        assert!(!unsafe { handle.free() });
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        handle.get_or_create(|| Tracked { drops: &drops });
        drop(handle);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_racing_creators_keep_one() {
        let made = Arc::new(AtomicUsize::new(0));
        let handle = Arc::new(LazyHandle::<usize>::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let (made, handle, barrier) = (made.clone(), handle.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    *handle.get_or_create(|| {
                        made.fetch_add(1, Ordering::SeqCst);
                        i
                    })
                })
            })
            .collect();

        let seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
        assert!(made.load(Ordering::SeqCst) >= 1);
    }
}
