//! Cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{UpdateError, UpdateResult};

/// Shared cancellation flag.
///
/// A plan checks the token at phase boundaries and between chunks, so a
/// chunk already handed to the backend always completes first.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Cancelled`].
    pub fn check(&self) -> UpdateResult<()> {
        if self.is_cancelled() {
            Err(UpdateError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_observes_cancel() {
        let token = CancelToken::new();
        let other = token.clone();
        assert_eq!(other.check(), Ok(()));
        token.cancel();
        assert_eq!(other.check(), Err(UpdateError::Cancelled));
    }
}
