//! Readiness poller.
//!
//! There is no push notification for "navigation finished", so readiness is
//! inferred by sampling [`Registry::is_loading`] on a fixed interval. Each
//! sample is a timer re-armed after the previous one completes; nothing
//! spins. The poll stops when:
//!
//! - a sample reports "not loading" (success),
//! - the handle disappears, e.g. a concurrent close ([`Error::UnknownHandle`]),
//! - the optional timeout elapses ([`Error::Timeout`]),
//! - the caller drops the future.
//!
//! Concurrent waits on one handle are independent; each takes its own samples.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, trace};

use crate::error::{Error, Result, saturating_millis};
use crate::identifiers::Handle;

use super::options::DEFAULT_POLL_INTERVAL;
use super::registry::Registry;

// ============================================================================
// PollOptions
// ============================================================================

/// Settings for one readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay before each sample.
    pub interval: Duration,

    /// Upper bound on the whole wait. `None` waits indefinitely.
    pub timeout: Option<Duration>,

    /// Samples to wait for a navigation to start before accepting
    /// "not loading" as settled. `None` accepts the first "not loading".
    pub navigation_grace: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            navigation_grace: None,
        }
    }
}

// ============================================================================
// PollReport
// ============================================================================

/// Summary of a completed readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Samples taken, the settling one included.
    pub samples: u32,
    /// Whether any sample reported a navigation in flight.
    pub saw_loading: bool,
}

// ============================================================================
// Registry - Readiness
// ============================================================================

impl Registry {
    /// Waits until the context has no navigation in flight.
    ///
    /// Uses the registry's configured interval and timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownHandle`] if the handle is closed while polling
    /// - [`Error::Timeout`] if a ready timeout is configured and elapses
    pub async fn await_ready(&self, handle: Handle) -> Result<PollReport> {
        let options = self.options().poll_options();
        self.await_ready_with(handle, options).await
    }

    /// Waits for a navigation that is expected to start shortly.
    ///
    /// Applies the configured navigation grace so that a navigation which
    /// has not begun by the first sample is not mistaken for a settled page.
    pub async fn await_navigation(&self, handle: Handle) -> Result<PollReport> {
        let options = self.options().navigation_poll_options();
        self.await_ready_with(handle, options).await
    }

    /// Waits until the context settles, with explicit options.
    pub async fn await_ready_with(&self, handle: Handle, options: PollOptions) -> Result<PollReport> {
        debug!(%handle, ?options, "Awaiting readiness");

        let poll = poll_until_settled(self, handle, options);
        let report = match options.timeout {
            Some(limit) => timeout(limit, poll).await.map_err(|_| {
                let timeout_ms = saturating_millis(limit);
                debug!(%handle, timeout_ms, "Readiness wait timed out");
                Error::timeout(format!("waiting for {handle} to finish loading"), timeout_ms)
            })??,
            None => poll.await?,
        };

        debug!(%handle, samples = report.samples, "Context ready");
        Ok(report)
    }
}

// ============================================================================
// Poll Loop
// ============================================================================

/// Samples `is_loading` until the context settles.
async fn poll_until_settled(
    registry: &Registry,
    handle: Handle,
    options: PollOptions,
) -> Result<PollReport> {
    let mut samples = 0u32;
    let mut saw_loading = false;

    loop {
        sleep(options.interval).await;

        let loading = registry.is_loading(handle).await?;
        samples += 1;
        trace!(%handle, samples, loading, "Readiness sample");

        if loading {
            saw_loading = true;
            continue;
        }

        match options.navigation_grace {
            Some(grace) if !saw_loading && samples < grace => continue,
            _ => break,
        }
    }

    Ok(PollReport {
        samples,
        saw_loading,
    })
}

// ============================================================================
// Tests
// ============================================================================
