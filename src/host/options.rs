//! Registry configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use headless_webview::{HandleAllocation, RegistryOptions};
//!
//! let options = RegistryOptions::new()
//!     .with_poll_interval(Duration::from_millis(50))
//!     .with_ready_timeout(Duration::from_secs(20))
//!     .with_handle_allocation(HandleAllocation::Monotonic);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

use super::allocator::HandleAllocation;
use super::poller::PollOptions;

// ============================================================================
// Constants
// ============================================================================

/// Interval between readiness samples.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Samples to wait for a navigation to start when one is expected.
pub const DEFAULT_NAVIGATION_GRACE: u32 = 5;

/// Name of the registry thread.
const DEFAULT_THREAD_NAME: &str = "webview-registry";

// ============================================================================
// RegistryOptions
// ============================================================================

/// Registry and readiness-poller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Interval between `is_loading` samples.
    pub poll_interval: Duration,

    /// Upper bound on a readiness wait. `None` waits indefinitely.
    pub ready_timeout: Option<Duration>,

    /// Samples to wait for an expected navigation to start.
    pub navigation_grace: u32,

    /// Handle allocation policy.
    pub handle_allocation: HandleAllocation,

    /// Name given to the registry thread.
    pub thread_name: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl RegistryOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            ready_timeout: None,
            navigation_grace: DEFAULT_NAVIGATION_GRACE,
            handle_allocation: HandleAllocation::default(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RegistryOptions {
    /// Sets the interval between readiness samples.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bounds every readiness wait.
    #[inline]
    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Sets the navigation grace in samples.
    #[inline]
    #[must_use]
    pub fn with_navigation_grace(mut self, samples: u32) -> Self {
        self.navigation_grace = samples;
        self
    }

    /// Sets the handle allocation policy.
    #[inline]
    #[must_use]
    pub fn with_handle_allocation(mut self, policy: HandleAllocation) -> Self {
        self.handle_allocation = policy;
        self
    }

    /// Sets the registry thread name.
    #[inline]
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

// ============================================================================
// Derived Settings
// ============================================================================

impl RegistryOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero poll interval or an empty
    /// thread name.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be greater than zero"));
        }
        if self.thread_name.trim().is_empty() {
            return Err(Error::config("registry thread name must not be empty"));
        }
        Ok(())
    }

    /// Poll options for a plain readiness wait.
    #[must_use]
    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: self.poll_interval,
            timeout: self.ready_timeout,
            navigation_grace: None,
        }
    }

    /// Poll options for a wait that expects a navigation to start.
    #[must_use]
    pub fn navigation_poll_options(&self) -> PollOptions {
        PollOptions {
            navigation_grace: Some(self.navigation_grace),
            ..self.poll_options()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
