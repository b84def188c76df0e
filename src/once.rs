//! Run-until-first-success primitive.
//!
//! `std::sync::Once` and `OnceLock` treat the first attempt as final. Connector
//! startup needs the opposite for fallible work such as opening a broker
//! connection: a failed attempt must leave the gate open so the next caller
//! can try again, while a successful one must never run again.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Performs an action exactly once, unless the action fails.
///
/// ```
/// use connector_events::RetryOnce;
///
/// let once = RetryOnce::new();
/// assert!(once.try_run(|| Err::<(), _>("broker down")).is_err());
/// assert!(once.try_run(|| Ok::<(), &str>(())).is_ok());
/// // Already done; this action never runs.
/// assert!(once.try_run(|| Err::<(), _>("unreachable")).is_ok());
/// ```
///
/// No call to `try_run` returns until the in-flight action has finished, so
/// calling `try_run` on the same instance from inside the action deadlocks.
/// A panic inside the action counts as a failure: the flag stays clear and the
/// next call retries.
#[derive(Debug, Default)]
pub struct RetryOnce {
    /// Set only after an action has returned `Ok`. Read on the hot path.
    done: AtomicBool,
    /// Serializes attempts.
    lock: Mutex<()>,
}

impl RetryOnce {
    pub fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            lock: Mutex::new(()),
        }
    }

    /// Run `action` unless a previous call already succeeded.
    ///
    /// Returns `Ok(())` immediately once an action has succeeded. Otherwise
    /// blocks until any in-flight attempt resolves, re-checks, and runs
    /// `action` if still needed, returning its error on failure.
    pub fn try_run<F, E>(&self, action: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        if self.done.load(Ordering::Acquire) {
            return Ok(());
        }
        self.run_slow(action)
    }

    #[cold]
    fn run_slow<F, E>(&self, action: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let _guard = self.lock.lock();
        if !self.done.load(Ordering::Relaxed) {
            action()?;
            // Published only after the action has returned, so a fast-path
            // reader never observes `done` while the action is still running.
            self.done.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Whether an action has completed successfully.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}
