//! Scoped re-entrancy flag
//!
//! Guards state deserialization: a setter triggered while a document is being
//! applied must not start applying the same document again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared boolean that can be held by at most one [`ReentrancyGuard`]
#[derive(Debug, Clone, Default)]
pub struct ReentrancyFlag {
    active: Arc<AtomicBool>,
}

impl ReentrancyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the flag
    ///
    /// Returns `None` if it is already held. The flag is released when the
    /// returned guard is dropped.
    pub fn try_enter(&self) -> Option<ReentrancyGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReentrancyGuard {
                active: Arc::clone(&self.active),
            })
    }

    /// Check if a guard is currently held
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases its [`ReentrancyFlag`] on drop
#[derive(Debug)]
#[must_use = "the flag is released as soon as the guard is dropped"]
pub struct ReentrancyGuard {
    active: Arc<AtomicBool>,
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
