//! Open, readiness, and close.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, saturating_millis};
use crate::identifiers::Handle;
use crate::protocol::Call;
use crate::protocol::outcome::decode_handle;
use crate::transport::CallBoundary;

use super::core::{ClientInner, ClientState, spawn_close};
use super::readiness::Readiness;
use super::BridgeClient;

// ============================================================================
// OpeningGuard
// ============================================================================

/// Returns an unfinished `Opening` state to `Uninitialized`.
///
/// Covers both a failed open and an `init` future dropped mid-flight.
struct OpeningGuard<'a>(&'a ClientInner);

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        if *state == ClientState::Opening {
            *state = ClientState::Uninitialized;
        }
    }
}

// ============================================================================
// BridgeClient - Lifecycle
// ============================================================================

impl BridgeClient {
    /// Opens a browsing context on `url`.
    ///
    /// Returns once the registry has issued a handle; the page keeps loading
    /// in the background and a readiness handshake starts immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInitialized`] if opening or already open
    /// - [`Error::Closed`] if closed, including a close that raced this call
    /// - [`Error::InvalidUrl`] or any other registry failure, leaving the
    ///   client uninitialized
    pub async fn init(&self, url: &str) -> Result<Handle> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                ClientState::Uninitialized => *state = ClientState::Opening,
                ClientState::Opening | ClientState::Open(_) => {
                    return Err(Error::AlreadyInitialized);
                }
                ClientState::Closed => return Err(Error::Closed),
            }
        }

        let _guard = OpeningGuard(&self.inner);

        let payload = self
            .inner
            .boundary
            .invoke(Call::Open {
                url: url.to_string(),
            })
            .await?;
        let handle = decode_handle(&payload)?;

        {
            let mut state = self.inner.state.lock();
            if *state != ClientState::Opening {
                drop(state);
                debug!(%handle, "Closed while opening, releasing handle");
                spawn_close(&self.inner.boundary, handle);
                return Err(Error::Closed);
            }
            *state = ClientState::Open(handle);
        }

        info!(%handle, url, "Client opened");
        self.spawn_handshake(handle);
        Ok(handle)
    }

    /// Runs `callback` once the page is ready.
    ///
    /// Runs it immediately if already ready; otherwise queues it. Queued
    /// callbacks run in registration order, each exactly once.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] before a successful `init`
    /// - [`Error::Closed`] after `close`
    /// - [`Error::ReadinessFailed`] if the handshake failed
    pub fn on_ready<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.open_handle()?;
        self.inner.readiness.subscribe(Box::new(callback))
    }

    /// Waits until the page is ready.
    ///
    /// # Errors
    ///
    /// - the errors of [`BridgeClient::on_ready`]
    /// - [`Error::Closed`] if closed while waiting
    /// - [`Error::Timeout`] if a ready timeout is configured and elapses
    pub async fn wait_for_ready(&self) -> Result<()> {
        self.open_handle()?;
        let Some(waiter) = self.inner.readiness.waiter()? else {
            return Ok(());
        };

        let readiness = &self.inner.readiness;
        let wait = async {
            waiter
                .await
                .map_err(|_| readiness.terminal_error().unwrap_or(Error::Closed))
        };

        match self.inner.options.ready_timeout {
            Some(limit) => timeout(limit, wait).await.map_err(|_| {
                Error::timeout("waiting for readiness", saturating_millis(limit))
            })?,
            None => wait.await,
        }
    }

    /// Closes the client.
    ///
    /// The transition to [`ClientState::Closed`] is immediate and final.
    /// The registry close is sent in the background and its outcome is
    /// not reported. Later calls are no-ops.
    ///
    /// Pending waits fail with [`Error::Closed`]. Callbacks already queued
    /// by [`BridgeClient::on_ready`] still run if the host answers the
    /// readiness handshake that was in flight.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), ClientState::Closed);
        if previous == ClientState::Closed {
            return;
        }

        self.inner.readiness.close();

        match previous {
            ClientState::Open(handle) => {
                info!(%handle, "Client closed");
                spawn_close(&self.inner.boundary, handle);
            }
            _ => debug!(?previous, "Client closed before open"),
        }
    }
}

// ============================================================================
// BridgeClient - Internal
// ============================================================================

impl BridgeClient {
    /// Starts the readiness handshake for a freshly opened handle.
    pub(crate) fn spawn_handshake(&self, handle: Handle) {
        drop(self.spawn_readiness_round(handle, false));
    }

    /// Runs one `onReady` round in its own task.
    ///
    /// The task settles readiness whether or not anyone awaits it, and
    /// holds no reference to the client itself, so an abandoned client can
    /// still be dropped and closed.
    pub(crate) fn spawn_readiness_round(
        &self,
        handle: Handle,
        expect_navigation: bool,
    ) -> JoinHandle<Result<()>> {
        let boundary = Arc::clone(&self.inner.boundary);
        let readiness = Arc::clone(&self.inner.readiness);

        tokio::spawn(readiness_round(boundary, readiness, handle, expect_navigation))
    }
}

/// Asks the host to report readiness and settles `readiness` with the answer.
async fn readiness_round(
    boundary: Arc<dyn CallBoundary>,
    readiness: Arc<Readiness>,
    handle: Handle,
    expect_navigation: bool,
) -> Result<()> {
    let call = Call::OnReady {
        handle,
        expect_navigation,
    };
    match boundary.invoke(call).await {
        Ok(_) => {
            let drained = readiness.mark_ready();
            debug!(%handle, drained, expect_navigation, "Context ready");
            Ok(())
        }
        Err(e) => {
            warn!(%handle, error = %e, expect_navigation, "Readiness round failed");
            readiness.fail(e.to_string());
            Err(e)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
