//! Provider-wide mode toggles
//!
//! Each component that depends on a toggle receives an `Arc<ProviderSettings>`
//! at construction. Two settings objects never interfere, so tests can run
//! concurrently with different modes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Timeouts applied to every backend and metadata request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Whole-request timeout for compute API calls
    pub request: Duration,

    /// Whole-request timeout for instance metadata queries
    pub metadata: Duration,
}

impl Timeouts {
    pub const fn production() -> Self {
        Self {
            request: Duration::from_secs(60),
            metadata: Duration::from_secs(10),
        }
    }

    pub const fn short() -> Self {
        Self {
            request: Duration::from_millis(2000),
            metadata: Duration::from_millis(250),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::production()
    }
}

/// Explicit toggles for fixed-metadata mode and short-timeout mode.
///
/// Toggles are idempotent; setting the current value again is a no-op.
#[derive(Debug, Default)]
pub struct ProviderSettings {
    fixed_metadata: AtomicBool,
    short_timeouts: AtomicBool,
}

impl ProviderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Serve instance metadata from fixed values instead of the network
    pub fn use_fixed_metadata(&self, enabled: bool) {
        if self.fixed_metadata.swap(enabled, Ordering::SeqCst) != enabled {
            tracing::debug!(enabled, "fixed metadata mode changed");
        }
    }

    pub fn fixed_metadata(&self) -> bool {
        self.fixed_metadata.load(Ordering::SeqCst)
    }

    /// Use short timeouts for all backend calls
    pub fn use_short_timeouts(&self, enabled: bool) {
        if self.short_timeouts.swap(enabled, Ordering::SeqCst) != enabled {
            tracing::debug!(enabled, "short timeout mode changed");
        }
    }

    pub fn short_timeouts(&self) -> bool {
        self.short_timeouts.load(Ordering::SeqCst)
    }

    /// Timeouts for the currently active mode
    pub fn timeouts(&self) -> Timeouts {
        if self.short_timeouts() {
            Timeouts::short()
        } else {
            Timeouts::production()
        }
    }
}
