/*!
 * FEB Backend (cooperative ULT, full/empty bits)
 *
 * Every native object is a single word tagged full or empty. Reading a word
 * "full to empty" takes it, filling it gives it back; a task that finds the
 * word empty yields and polls again.
 *
 * - Mutex: full means free. `lock` is a blocking full-to-empty read,
 *   `unlock` fills.
 * - Condition: a generation word. A waiter samples the generation while it
 *   still holds the mutex, fills the mutex, then polls until the
 *   generation moves. `signal` and `broadcast` both advance the generation,
 *   so a signal may wake every waiter; waiters re-check their predicate as
 *   the monitor pattern requires.
 */

use super::super::spinwait::Backoff;
use super::super::traits::{Backend, RawCondition, RawMutex, TryLock};
use super::coop::{self, Runtime};
use super::owner::Ownership;
use crate::core::context;
use crate::core::errors::{SyncError, SyncResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static RUNTIME: Runtime = Runtime::new("feb");

/// FEB backend marker
#[derive(Debug, Clone, Copy, Default)]
pub struct Feb;

impl Backend for Feb {
    const NAME: &'static str = "feb";
    const COOPERATIVE: bool = true;

    type Mutex = FebMutex;
    type Condition = FebCondition;

    #[inline]
    fn ensure_init() {
        RUNTIME.ensure_init();
    }

    #[inline]
    fn yield_now() {
        coop::yield_now();
    }
}

/// A word with a full/empty tag
#[derive(Debug)]
pub struct FebWord {
    full: AtomicBool,
}

impl FebWord {
    /// A word that starts full
    pub const fn full() -> Self {
        Self {
            full: AtomicBool::new(true),
        }
    }

    /// Take the word if it is full, without waiting
    #[inline]
    pub fn read_fe_nb(&self) -> bool {
        self.full
            .compare_exchange(true, false, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Wait until the word is full, then take it
    pub fn read_fe(&self) {
        let mut backoff = Backoff::new();
        while !self.read_fe_nb() {
            backoff.snooze::<Feb>();
        }
    }

    /// Mark the word full; returns false if it already was
    #[inline]
    pub fn fill(&self) -> bool {
        !self.full.swap(true, Ordering::Release)
    }

    /// Whether the word is currently full
    #[inline]
    pub fn is_full(&self) -> bool {
        self.full.load(Ordering::Relaxed)
    }
}

/// Native FEB mutex
pub struct FebMutex {
    word: FebWord,
    ownership: Ownership,
}

impl FebMutex {
    fn fill_word(&self) -> SyncResult<()> {
        if self.word.fill() {
            Ok(())
        } else {
            Err(SyncError::Substrate {
                backend: Feb::NAME,
                op: "fill",
                code: 1,
            })
        }
    }
}

impl RawMutex for FebMutex {
    fn new(recursive: bool) -> Self {
        Feb::ensure_init();
        Self {
            word: FebWord::full(),
            ownership: Ownership::new(recursive),
        }
    }

    fn lock(&self) -> SyncResult<()> {
        let me = context::current();
        if let Some(result) = self.ownership.reenter(me) {
            return result;
        }
        self.word.read_fe();
        self.ownership.acquired(me);
        Ok(())
    }

    fn try_lock(&self) -> SyncResult<TryLock> {
        let me = context::current();
        if let Some(result) = self.ownership.try_reenter(me) {
            return Ok(result);
        }
        if self.word.read_fe_nb() {
            self.ownership.acquired(me);
            Ok(TryLock::Acquired)
        } else {
            Ok(TryLock::Busy)
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        let me = context::current();
        if self.ownership.release(me)? {
            self.fill_word()?;
        }
        Ok(())
    }

    #[inline]
    fn is_owned_by_current(&self) -> bool {
        self.ownership.held_by(context::current())
    }
}

/// Native FEB condition variable
pub struct FebCondition {
    generation: AtomicUsize,
}

impl RawCondition<FebMutex> for FebCondition {
    fn new() -> Self {
        Feb::ensure_init();
        Self {
            generation: AtomicUsize::new(0),
        }
    }

    fn wait(&self, mutex: &FebMutex) -> SyncResult<()> {
        let me = context::current();
        let depth = mutex.ownership.suspend(me)?;

        let seen = self.generation.load(Ordering::Acquire);
        let released = mutex.fill_word();
        if released.is_ok() {
            while self.generation.load(Ordering::Acquire) == seen {
                Feb::yield_now();
            }
        }

        mutex.word.read_fe();
        mutex.ownership.resume(me, depth);
        released
    }

    fn signal(&self) -> SyncResult<()> {
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn broadcast(&self) -> SyncResult<()> {
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_feb_word_transitions() {
        let word = FebWord::full();
        assert!(word.is_full());
        assert!(word.read_fe_nb());
        assert!(!word.is_full());
        assert!(!word.read_fe_nb());
        assert!(word.fill());
        assert!(!word.fill());
    }

    #[test]
    fn test_feb_mutex_recursive() {
        let m = FebMutex::new(true);
        m.lock().unwrap();
        m.lock().unwrap();
        assert_eq!(m.try_lock(), Ok(TryLock::Acquired));
        m.unlock().unwrap();
        m.unlock().unwrap();
        assert!(!m.word.is_full());
        m.unlock().unwrap();
        assert!(m.word.is_full());
    }

    #[test]
    fn test_feb_signal_after_release_is_seen() {
        let pair = Arc::new((FebMutex::new(false), FebCondition::new()));
        let flag = Arc::new(AtomicBool::new(false));

        let (p, f) = (pair.clone(), flag.clone());
        let handle = thread::spawn(move || {
            let (m, c) = &*p;
            m.lock().unwrap();
            while !f.load(Ordering::SeqCst) {
                c.wait(m).unwrap();
            }
            m.unlock().unwrap();
        });

        thread::sleep(Duration::from_millis(20));
        let (m, c) = &*pair;
        m.lock().unwrap();
        flag.store(true, Ordering::SeqCst);
        c.signal().unwrap();
        m.unlock().unwrap();

        handle.join().unwrap();
    }
}
