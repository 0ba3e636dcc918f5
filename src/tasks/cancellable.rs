use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation token shared between a background load and the UI side that requested it.
///
/// The background job checks it before and after doing the work; the UI side checks it again
/// when the result arrives, so a cancelled request never reaches its callback.
#[derive(Debug, Clone, Default)]
pub struct CancellableTask {
    cancelled: Arc<AtomicBool>,
}

impl CancellableTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
