//! Cancellation context shared by lock acquisition and FFmpeg invocations.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cloneable cancellation signal.
///
/// A child token observes its parent's cancellation, but cancelling a child
/// leaves the parent untouched. There is no implicit timeout: callers that
/// need one cancel the token themselves.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    /// Create a new root token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a token cancelled together with this one.
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }

    /// Signal cancellation. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether this token or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolve once this token or any ancestor is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancelled()
    }
}

impl From<CancellationToken> for CancelToken {
    fn from(inner: CancellationToken) -> Self {
        Self { inner }
    }
}
