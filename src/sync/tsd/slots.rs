/*!
 * Native Per-Context Slots
 *
 * Key table shared by every backend: each execution context of the
 * substrates maps onto a kernel thread here, so a thread-local slot vector
 * indexed by key serves all three.
 *
 * Keys carry a generation. Deleting a key and reusing its index bumps the
 * generation, so values stored under the old key are never visible through
 * the new one.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::TSD_MAX_KEYS;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::ptr;
use tracing::debug;

/// Destructor run on a context's non-null value
pub type Destructor = fn(*mut ());

/// Handle to a per-context storage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TsdKey {
    index: u32,
    generation: u32,
}

impl TsdKey {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }
}

struct KeyEntry {
    generation: u32,
    live: bool,
    destructor: Option<Destructor>,
}

static KEYS: RwLock<Vec<KeyEntry>> = parking_lot::const_rwlock(Vec::new());

struct LocalSlots {
    values: RefCell<Vec<(u32, *mut ())>>,
}

impl Drop for LocalSlots {
    fn drop(&mut self) {
        let values = std::mem::take(self.values.get_mut());
        if values.iter().all(|(_, value)| value.is_null()) {
            return;
        }

        // Collect first: destructors may create or delete keys
        let pending: Vec<(Destructor, *mut ())> = {
            let keys = KEYS.read();
            values
                .into_iter()
                .enumerate()
                .filter(|(_, (_, value))| !value.is_null())
                .filter_map(|(index, (generation, value))| {
                    let entry = keys.get(index)?;
                    if entry.live && entry.generation == generation {
                        entry.destructor.map(|destructor| (destructor, value))
                    } else {
                        None
                    }
                })
                .collect()
        };

        for (destructor, value) in pending {
            destructor(value);
        }
    }
}

thread_local! {
    static SLOTS: LocalSlots = const {
        LocalSlots {
            values: RefCell::new(Vec::new()),
        }
    };
}

fn validate(keys: &[KeyEntry], key: TsdKey) -> SyncResult<()> {
    match keys.get(key.index as usize) {
        Some(entry) if entry.live && entry.generation == key.generation => Ok(()),
        _ => Err(SyncError::BadParam("unknown or deleted TSD key")),
    }
}

pub(crate) fn create(backend: &'static str, destructor: Option<Destructor>) -> SyncResult<TsdKey> {
    let mut keys = KEYS.write();

    let key = if let Some(index) = keys.iter().position(|entry| !entry.live) {
        let entry = &mut keys[index];
        entry.generation = entry.generation.wrapping_add(1);
        entry.live = true;
        entry.destructor = destructor;
        TsdKey {
            index: index as u32,
            generation: entry.generation,
        }
    } else if keys.len() < TSD_MAX_KEYS {
        keys.push(KeyEntry {
            generation: 0,
            live: true,
            destructor,
        });
        TsdKey {
            index: (keys.len() - 1) as u32,
            generation: 0,
        }
    } else {
        // EAGAIN: key space exhausted
        return Err(SyncError::Substrate {
            backend,
            op: "key_create",
            code: 11,
        });
    };

    debug!(backend, key = key.index, "TSD key created");
    Ok(key)
}

pub(crate) fn delete(key: TsdKey) -> SyncResult<()> {
    let mut keys = KEYS.write();
    validate(&keys, key)?;
    let entry = &mut keys[key.index as usize];
    entry.live = false;
    entry.destructor = None;
    Ok(())
}

pub(crate) fn set(key: TsdKey, value: *mut ()) -> SyncResult<()> {
    validate(&KEYS.read(), key)?;
    SLOTS
        .try_with(|slots| {
            let mut values = slots.values.borrow_mut();
            let index = key.index as usize;
            if values.len() <= index {
                values.resize(index + 1, (0, ptr::null_mut()));
            }
            values[index] = (key.generation, value);
        })
        .map_err(|_| SyncError::BadParam("TSD unavailable while the context exits"))
}

pub(crate) fn get(key: TsdKey) -> SyncResult<*mut ()> {
    validate(&KEYS.read(), key)?;
    SLOTS
        .try_with(|slots| {
            slots
                .values
                .borrow()
                .get(key.index as usize)
                .filter(|(generation, _)| *generation == key.generation)
                .map_or(ptr::null_mut(), |(_, value)| *value)
        })
        .map_err(|_| SyncError::BadParam("TSD unavailable while the context exits"))
}
