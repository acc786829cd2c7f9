//! Advisory locks keyed by a logical resource name.
//!
//! Callers that mutate the same RDS instance (or the same database/user on
//! it) take the lock for that name first, so two operations in one process
//! never race each other into a server-side conflict. Per-key state is created
//! on first use and lives for the rest of the process.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

/// Longest single condvar wait in [`KeyedLock::lock_until`]; bounds how late a
/// cancellation is noticed.
const WAIT_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

/// Registry of named locks.
#[derive(Debug, Default)]
pub struct KeyedLock {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

/// Holds one key; released on drop.
#[derive(Debug)]
pub struct KeyedGuard {
    key: String,
    slot: Arc<Slot>,
}

impl KeyedGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        let mut held = self.slot.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = false;
        self.slot.released.notify_one();
        tracing::trace!(key = %self.key, "keyed lock released");
    }
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static KeyedLock {
        static GLOBAL: OnceLock<KeyedLock> = OnceLock::new();
        GLOBAL.get_or_init(KeyedLock::new)
    }

    /// Block until `key` is free, then hold it until the guard drops.
    pub fn lock(&self, key: &str) -> KeyedGuard {
        let slot = self.slot(key);
        {
            let mut held = slot.held.lock().unwrap_or_else(PoisonError::into_inner);
            while *held {
                held = slot
                    .released
                    .wait(held)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            *held = true;
        }
        tracing::trace!(key, "keyed lock acquired");
        KeyedGuard {
            key: key.to_string(),
            slot,
        }
    }

    /// Like [`lock`](Self::lock), but gives up with `None` once `deadline`
    /// passes or `cancelled` returns true while the key is still held.
    pub fn lock_until(
        &self,
        key: &str,
        deadline: Instant,
        cancelled: impl Fn() -> bool,
    ) -> Option<KeyedGuard> {
        let slot = self.slot(key);
        {
            let mut held = slot.held.lock().unwrap_or_else(PoisonError::into_inner);
            while *held {
                let now = Instant::now();
                if now >= deadline || cancelled() {
                    tracing::debug!(key, "gave up waiting for keyed lock");
                    return None;
                }
                let wait = deadline.saturating_duration_since(now).min(WAIT_SLICE);
                held = slot
                    .released
                    .wait_timeout(held, wait)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            *held = true;
        }
        tracing::trace!(key, "keyed lock acquired");
        Some(KeyedGuard {
            key: key.to_string(),
            slot,
        })
    }

    /// Take `key` only if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Option<KeyedGuard> {
        let slot = self.slot(key);
        {
            let mut held = slot.held.lock().unwrap_or_else(PoisonError::into_inner);
            if *held {
                return None;
            }
            *held = true;
        }
        Some(KeyedGuard {
            key: key.to_string(),
            slot,
        })
    }

    /// Number of keys ever locked through this registry.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.to_string()).or_default())
    }
}
