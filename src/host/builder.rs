//! Builder pattern for registry configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use headless_webview::{Registry, SimulatedEngine};
//!
//! # fn example() -> headless_webview::Result<()> {
//! let registry = Registry::builder()
//!     .engine(SimulatedEngine::new())
//!     .poll_interval(Duration::from_millis(50))
//!     .spawn()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{Error, Result};

use super::allocator::HandleAllocation;
use super::options::RegistryOptions;
use super::registry::Registry;

// ============================================================================
// RegistryBuilder
// ============================================================================

/// Builder for spawning a [`Registry`].
///
/// Use [`Registry::builder()`] to create a new builder.
#[derive(Default)]
pub struct RegistryBuilder {
    /// Browsing engine moved onto the registry thread.
    engine: Option<Box<dyn Engine>>,
    /// Registry options.
    options: RegistryOptions,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("has_engine", &self.engine.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Registry {
    /// Creates a configuration builder for the registry.
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }
}

// ============================================================================
// RegistryBuilder Implementation
// ============================================================================

impl RegistryBuilder {
    /// Creates a builder with default options and no engine.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the browsing engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Engine) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Replaces all options at once.
    #[must_use]
    pub fn options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the interval between readiness samples.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options = self.options.with_poll_interval(interval);
        self
    }

    /// Bounds every readiness wait.
    #[must_use]
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_ready_timeout(timeout);
        self
    }

    /// Sets the navigation grace in samples.
    #[must_use]
    pub fn navigation_grace(mut self, samples: u32) -> Self {
        self.options = self.options.with_navigation_grace(samples);
        self
    }

    /// Sets the handle allocation policy.
    #[must_use]
    pub fn handle_allocation(mut self, policy: HandleAllocation) -> Self {
        self.options = self.options.with_handle_allocation(policy);
        self
    }

    /// Spawns the registry thread.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no engine is set or options are invalid
    /// - [`Error::Io`] if the registry thread cannot start
    pub fn spawn(self) -> Result<Registry> {
        let engine = self.engine.ok_or_else(|| {
            Error::config(
                "A browsing engine is required. Use .engine() to set it.\n\
                 Example: Registry::builder().engine(SimulatedEngine::new())",
            )
        })?;

        Registry::spawn(engine, self.options)
    }
}

// ============================================================================
// Tests
// ============================================================================
