//! Pending results
//!
//! Reads and writes return a [`Pending`] at once; the store resolves it when
//! the transaction executes. Every pending result of a batch is resolved,
//! with an error if the batch fails, so waiting never hangs on a committed
//! or dropped transaction.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use vellum_core::Result;

struct Slot<T> {
    value: Mutex<Option<Result<T>>>,
    ready: Condvar,
}

/// A result that becomes available when its transaction executes
pub struct Pending<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Pending {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone> Pending<T> {
    pub(crate) fn new() -> Self {
        Pending {
            slot: Arc::new(Slot {
                value: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// Block until resolved
    pub fn wait(&self) -> Result<T> {
        let mut value = self.slot.value.lock();
        loop {
            if let Some(result) = value.as_ref() {
                return result.clone();
            }
            self.slot.ready.wait(&mut value);
        }
    }

    /// The result if already resolved; never blocks
    pub fn try_get(&self) -> Option<Result<T>> {
        self.slot.value.lock().clone()
    }

    /// Whether the result is available
    pub fn is_done(&self) -> bool {
        self.slot.value.lock().is_some()
    }

    /// Resolve once; later calls are ignored
    pub(crate) fn resolve(&self, result: Result<T>) {
        let mut value = self.slot.value.lock();
        if value.is_none() {
            *value = Some(result);
            self.slot.ready.notify_all();
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let done = self.slot.value.lock().is_some();
        f.debug_struct("Pending").field("done", &done).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use vellum_core::VellumError;

    #[test]
    fn test_resolve_then_get() {
        let pending: Pending<u32> = Pending::new();
        assert!(!pending.is_done());
        assert!(pending.try_get().is_none());

        pending.resolve(Ok(7));
        assert!(pending.is_done());
        assert_eq!(pending.wait().unwrap(), 7);
        assert_eq!(pending.try_get().unwrap().unwrap(), 7);
    }

    #[test]
    fn test_first_resolution_wins() {
        let pending: Pending<u32> = Pending::new();
        pending.resolve(Err(VellumError::TransactionAlreadyActive));
        pending.resolve(Ok(1));
        assert!(pending.wait().is_err());
    }

    #[test]
    fn test_wait_blocks_until_resolved() {
        let pending: Pending<String> = Pending::new();
        let resolver = pending.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            resolver.resolve(Ok("done".to_string()));
        });
        assert_eq!(pending.wait().unwrap(), "done");
        handle.join().unwrap();
    }
}
