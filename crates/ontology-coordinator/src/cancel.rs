//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ontology_model::{ProviderError, ProviderResult};

/// A shared flag that asks running work to stop.
///
/// Cancellation is advisory: providers check the token at natural yield
/// points (between terms, between index pages) and return
/// [`ProviderError::Cancelled`]. Work that never checks simply runs to
/// completion and its result is discarded.
///
/// The same type doubles as the caller's interrupt signal: setting it while a
/// coordinator call is waiting makes the call stop waiting.
///
/// # Example
///
/// ```rust
/// use ontology_coordinator::CancellationToken;
///
/// let token = CancellationToken::new();
/// let seen_by_worker = token.clone();
/// token.cancel();
/// assert!(seen_by_worker.is_cancelled());
/// assert!(seen_by_worker.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(ProviderError::Cancelled)` if cancellation was requested.
    ///
    /// Intended for use with `?` inside provider loops.
    pub fn check(&self) -> ProviderResult<()> {
        if self.is_cancelled() {
            Err(ProviderError::Cancelled)
        } else {
            Ok(())
        }
    }
}
