//! Cooperative cancellation for long-running trials.
//!
//! A trial with a large cap may run for billions of iterations, so the sampler
//! polls a [`CancellationToken`] once per observation. Polling is a single
//! relaxed atomic load.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shared cancellation flag.
///
/// Clones share the same flag: cancelling any clone cancels all of them.
///
/// # Examples
///
/// ```rust
/// use snoop_kernel::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_view = token.clone();
/// assert!(!worker_view.is_cancelled());
///
/// token.cancel();
/// assert!(worker_view.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Cancels this token after `delay` from a background thread.
    ///
    /// The returned handle may be dropped; the timer thread exits on its own
    /// after firing.
    pub fn cancel_after(&self, delay: Duration) -> JoinHandle<()> {
        let token = self.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            tracing::debug!(?delay, "time limit reached, requesting cancellation");
            token.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_after_fires() {
        let token = CancellationToken::new();
        let handle = token.cancel_after(Duration::from_millis(5));
        handle.join().unwrap();
        assert!(token.is_cancelled());
    }
}
