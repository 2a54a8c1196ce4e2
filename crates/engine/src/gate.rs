//! Callback gate shared by stream handles and poll loops.
//!
//! Background tasks deliver every callback through [`Gate::deliver`], which
//! holds the gate's lock for the duration of the callback. [`Gate::cancel`]
//! takes the same lock, so once it returns no callback is running and none
//! will start. The embedded [`CancellationToken`] wakes the task so the
//! underlying I/O is dropped soon after, but callers never depend on that.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

pub(crate) struct Gate {
    open: Mutex<bool>,
    token: CancellationToken,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            open: Mutex::new(true),
            token: CancellationToken::new(),
        }
    }

    /// Close the gate. Returns `true` if it was still open. Idempotent.
    pub(crate) fn cancel(&self) -> bool {
        let was_open = std::mem::replace(&mut *self.lock(), false);
        self.token.cancel();
        was_open
    }

    pub(crate) fn is_open(&self) -> bool {
        *self.lock()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Run `f` if the gate is still open.
    pub(crate) fn deliver<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let open = self.lock();
        if *open {
            Some(f())
        } else {
            None
        }
    }

    /// Run `f` if the gate is still open, then close it.
    pub(crate) fn deliver_final<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let mut open = self.lock();
        if *open {
            *open = false;
            Some(f())
        } else {
            None
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        lock(&self.open)
    }
}

/// Lock a std mutex, recovering the data if a callback panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
