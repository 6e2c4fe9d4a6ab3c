//! Optimistic per-entry lock guarding chain-head splices.
//!
//! The lock word is a version counter: even = unlocked, odd = locked.
//! Acquisition CASes even → odd; release bumps back to even, so every
//! completed splice advances the version. Writers spin a bounded number of
//! times before giving up with `VersionError::Retry` — statements are meant
//! to be retried wholesale, not to queue.

use crate::config::OPT_LOCK_RETRY_LIMIT;
use crate::error::VersionError;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct OptLock {
    state: AtomicU64,
}

impl OptLock {
    pub fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
        }
    }

    /// Current version counter (even while unlocked).
    pub fn version(&self) -> u64 {
        self.state.load(Ordering::Acquire)
    }

    pub fn try_acquire(&self) -> Option<OptLockGuard<'_>> {
        let current = self.state.load(Ordering::Relaxed);
        if current & 1 != 0 {
            return None;
        }
        self.state
            .compare_exchange(current, current + 1, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| OptLockGuard { lock: self })
    }

    /// Spins up to the retry bound, then fails with `Retry`.
    pub fn acquire(&self) -> Result<OptLockGuard<'_>, VersionError> {
        for _ in 0..OPT_LOCK_RETRY_LIMIT {
            if let Some(guard) = self.try_acquire() {
                return Ok(guard);
            }
            std::hint::spin_loop();
        }
        Err(VersionError::Retry)
    }
}

#[derive(Debug)]
pub struct OptLockGuard<'a> {
    lock: &'a OptLock,
}

impl Drop for OptLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.fetch_add(1, Ordering::Release);
    }
}
