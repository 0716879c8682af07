//! Bridge client options.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// ClientOptions
// ============================================================================

/// Client-side settings.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use headless_webview::ClientOptions;
///
/// let options = ClientOptions::new().with_ready_timeout(Duration::from_secs(10));
/// assert_eq!(options.ready_timeout, Some(Duration::from_secs(10)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Upper bound on each wait for readiness. `None` waits indefinitely.
    pub ready_timeout: Option<Duration>,
}

impl ClientOptions {
    /// Creates options with defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds every readiness wait.
    #[inline]
    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_waits_indefinitely() {
        assert_eq!(ClientOptions::default().ready_timeout, None);
    }
}
