//! Storage adapters implementing the domain ports.

use std::time::Duration;

pub mod in_memory;
#[cfg(feature = "storage-postgres")]
pub mod postgres;

/// Options shared by every store implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Upper bound on waiting for a row hold. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

impl StoreOptions {
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}
