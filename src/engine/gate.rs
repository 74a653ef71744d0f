//! Bounded admission for in-flight batches.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Counting gate limiting how many batches are in flight at once.
///
/// `acquire` suspends until a slot is free and hands back an owned permit;
/// dropping the permit is the release, so the slot is returned on every exit
/// path of the guarded work, panics included. There is no manual release to
/// forget or double-call.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "gate capacity must be positive");
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
