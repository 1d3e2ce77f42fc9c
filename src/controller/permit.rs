//! Single-permit lock guarding device open and close.
//!
//! Unlike a mutex guard, the permit taken by `open` is released from the
//! background thread once the device answers, so it is not tied to a scope.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Returned when the permit lock is poisoned by a panicking holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poisoned;

/// Counting lock initialised with one permit.
#[derive(Debug)]
pub struct Permit {
    available: Mutex<bool>,
    released: Condvar,
}

impl Default for Permit {
    fn default() -> Self {
        Self::new()
    }
}

impl Permit {
    /// Creates a permit that is free.
    pub fn new() -> Self {
        Self {
            available: Mutex::new(true),
            released: Condvar::new(),
        }
    }

    /// Takes the permit, waiting at most `timeout`.
    ///
    /// Returns `Ok(false)` on timeout.
    pub fn try_acquire_for(&self, timeout: Duration) -> Result<bool, Poisoned> {
        let deadline = Instant::now() + timeout;
        let mut available = self.available.lock().map_err(|_| Poisoned)?;
        while !*available {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let (guard, _) = self
                .released
                .wait_timeout(available, remaining)
                .map_err(|_| Poisoned)?;
            available = guard;
        }
        *available = false;
        Ok(true)
    }

    /// Returns the permit. Releasing a free permit leaves a single permit.
    pub fn release(&self) {
        match self.available.lock() {
            Ok(mut available) => {
                *available = true;
                self.released.notify_one();
            }
            Err(poisoned) => {
                *poisoned.into_inner() = true;
                self.released.notify_one();
            }
        }
    }

    /// Returns true if the permit is free right now.
    pub fn is_available(&self) -> bool {
        self.available.lock().map(|a| *a).unwrap_or(false)
    }
}

/// Releases a permit when dropped.
pub(crate) struct PermitGuard<'a> {
    permit: &'a Permit,
}

impl<'a> PermitGuard<'a> {
    /// Wraps a permit that the caller already holds.
    pub(crate) fn held(permit: &'a Permit) -> Self {
        Self { permit }
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        self.permit.release();
    }
}
