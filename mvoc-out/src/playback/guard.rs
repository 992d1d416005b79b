//! Mix guard: the binary lock shared by the mixing engine and the output pump
//!
//! The segmented mix buffer is written by the mixing engine and drained by the
//! output pump. Both sides go through [`MixLock::acquire`], which blocks until
//! the lock is free and hands back a [`MixGuard`]. Releasing is dropping the
//! guard, so every exit path (early return, `?`, panic unwind) unlocks.
//!
//! The lock is not reentrant. A thread that already holds a guard and calls
//! `acquire` again deadlocks.
//!
//! ## Hold tracing
//!
//! A lock built with [`MixLock::traced`] records the interval each guard was
//! held for. Intervals are stamped after acquisition and before release, so
//! recorded intervals never extend past the real hold.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Which side of the producer/consumer pair took the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    /// The output pump, during a refill pass
    Pump,
    /// The mixing engine (or driver lifecycle calls made on its behalf)
    Collaborator,
}

/// One recorded guard hold
#[derive(Debug, Clone, Copy)]
pub struct HoldInterval {
    pub holder: Holder,
    pub acquired: Instant,
    pub released: Instant,
}

impl HoldInterval {
    /// True if the two intervals share any instant
    pub fn overlaps(&self, other: &HoldInterval) -> bool {
        self.acquired <= other.released && other.acquired <= self.released
    }
}

/// Binary lock around the shared mix state
pub struct MixLock<T> {
    state: Mutex<T>,
    trace: Option<Mutex<Vec<HoldInterval>>>,
}

impl<T> MixLock<T> {
    /// Create an untraced lock
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            trace: None,
        }
    }

    /// Create a lock that records every hold interval
    pub fn traced(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            trace: Some(Mutex::new(Vec::new())),
        }
    }

    /// Block until the lock is free, then take it
    ///
    /// A panic on another thread while it held the guard does not poison the
    /// lock for everyone else; the state is handed over as-is.
    pub fn acquire(&self, holder: Holder) -> MixGuard<'_, T> {
        let inner = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let acquired = self.trace.as_ref().map(|_| Instant::now());
        MixGuard {
            inner,
            trace: self.trace.as_ref(),
            holder,
            acquired,
        }
    }

    /// Take the lock only if it is free right now
    pub fn try_acquire(&self, holder: Holder) -> Option<MixGuard<'_, T>> {
        let inner = match self.state.try_lock() {
            Ok(inner) => inner,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return None,
        };
        let acquired = self.trace.as_ref().map(|_| Instant::now());
        Some(MixGuard {
            inner,
            trace: self.trace.as_ref(),
            holder,
            acquired,
        })
    }

    /// Whether hold intervals are being recorded
    pub fn is_traced(&self) -> bool {
        self.trace.is_some()
    }

    /// Snapshot of recorded hold intervals, in release order
    ///
    /// Empty for untraced locks.
    pub fn hold_intervals(&self) -> Vec<HoldInterval> {
        match &self.trace {
            Some(trace) => trace
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            None => Vec::new(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MixLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixLock")
            .field("traced", &self.is_traced())
            .finish_non_exhaustive()
    }
}

/// Proof that the mix lock is held
///
/// Dereferences to the protected state. Dropping it releases the lock.
pub struct MixGuard<'a, T> {
    inner: MutexGuard<'a, T>,
    trace: Option<&'a Mutex<Vec<HoldInterval>>>,
    holder: Holder,
    acquired: Option<Instant>,
}

impl<T> MixGuard<'_, T> {
    /// Who took this guard
    pub fn holder(&self) -> Holder {
        self.holder
    }

    /// Release the lock now
    pub fn unlock(self) {
        drop(self);
    }
}

impl<T> Deref for MixGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for MixGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for MixGuard<'_, T> {
    fn drop(&mut self) {
        // Runs before `inner` is dropped, i.e. while the lock is still held
        if let (Some(trace), Some(acquired)) = (self.trace, self.acquired) {
            let interval = HoldInterval {
                holder: self.holder,
                acquired,
                released: Instant::now(),
            };
            trace
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(interval);
        }
    }
}
