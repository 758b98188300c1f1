//! Miscellaneous utility structs and functions.

use derive_more::From;
use futures::future::AbortHandle;

/// Wrapper around [`AbortHandle`] which aborts [`Future`] on [`Drop`].
///
/// [`Future`]: std::future::Future
#[derive(Debug, From)]
pub struct TaskHandle(AbortHandle);

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Monotonic counter of session runs.
///
/// Every suspended continuation captures the current value and discards its
/// result once the value has moved on.
#[derive(Debug, Default)]
pub struct Epoch(std::cell::Cell<u64>);

impl Epoch {
    /// Returns the current value.
    #[inline]
    pub fn current(&self) -> u64 {
        self.0.get()
    }

    /// Moves to the next value and returns it.
    pub fn bump(&self) -> u64 {
        let next = self.0.get().wrapping_add(1);
        self.0.set(next);
        next
    }

    /// Indicates whether the provided value is still the current one.
    #[inline]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.0.get() == epoch
    }
}
