//! Exclusive tick ownership (§5). A process-local lease is enough for a
//! single-node deployment; a distributed lease with TTL for multi-node is
//! the same trait with a different backend and is not implemented here —
//! the trait boundary is the forward-compatible seam.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Held by whichever task is running the current tick. Dropping the guard
/// releases the lease; there is no renewal because a process-local lease
/// can't expire out from under its own holder.
pub struct LeaseGuard {
    held: Arc<AtomicBool>,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
pub trait TickLease: Send + Sync {
    /// Attempts to become the sole tick owner. Returns `None` if another
    /// tick (or approval handler, which shares the lease per §5) already
    /// holds it.
    async fn try_acquire(&self) -> Option<LeaseGuard>;
}

/// Single-node lease: one atomic flag, no TTL, no cross-process
/// visibility. A multi-node deployment needs a lease backed by shared
/// storage with a TTL so a dead holder's lease is reclaimable; that
/// backend would implement this same trait.
#[derive(Clone, Default)]
pub struct ProcessLocalLease {
    held: Arc<AtomicBool>,
}

impl ProcessLocalLease {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TickLease for ProcessLocalLease {
    async fn try_acquire(&self) -> Option<LeaseGuard> {
        match self.held.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => Some(LeaseGuard { held: self.held.clone() }),
            Err(_) => None,
        }
    }
}
