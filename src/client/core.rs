//! Core BridgeClient struct and accessors.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle as RuntimeHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::host::Registry;
use crate::identifiers::Handle;
use crate::protocol::Call;
use crate::transport::{CallBoundary, Connection, ConnectionOptions};

use super::options::ClientOptions;
use super::readiness::Readiness;

// ============================================================================
// ClientState
// ============================================================================

/// Lifecycle state of a [`BridgeClient`].
///
/// ```text
/// Uninitialized ──init──► Opening ──open ok──► Open(handle) ──close──► Closed
///       ▲                    │                                           ▲
///       └──── open failed ───┘                                           │
///  (any state) ───────────────────────── close ──────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No context yet.
    Uninitialized,
    /// `init` is waiting for the registry to open the context.
    Opening,
    /// A context is open under this handle.
    Open(Handle),
    /// Terminal.
    Closed,
}

/// Internal shared state for a client.
pub(crate) struct ClientInner {
    /// Boundary into the registry.
    pub boundary: Arc<dyn CallBoundary>,
    /// Lifecycle state.
    pub state: Mutex<ClientState>,
    /// Readiness of the open context (shared with the handshake task).
    pub readiness: Arc<Readiness>,
    /// Client options.
    pub options: ClientOptions,
}

// ============================================================================
// BridgeClient
// ============================================================================

/// Caller-side proxy for one browsing context.
///
/// Every operation that touches the page first waits for the context to
/// finish loading, so callers never race an unready page.
///
/// Cloning is cheap and all clones drive the same context. Dropping the
/// last clone of an open client closes the context.
///
/// # Example
///
/// ```ignore
/// let client = BridgeClient::connect(&registry);
/// client.init("https://example.com").await?;
///
/// let sum: i64 = client.evaluate("return 1+1").await?;
/// let url = client.get_url().await?;
/// client.close();
/// ```
#[derive(Clone)]
pub struct BridgeClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("state", &self.state())
            .field("ready", &self.is_ready())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    /// Creates an uninitialized client over `boundary`.
    #[must_use]
    pub fn new(boundary: impl CallBoundary + 'static) -> Self {
        Self::with_options(boundary, ClientOptions::default())
    }

    /// Creates an uninitialized client with custom options.
    #[must_use]
    pub fn with_options(boundary: impl CallBoundary + 'static, options: ClientOptions) -> Self {
        Self::from_shared(Arc::new(boundary), options)
    }

    /// Creates an uninitialized client over a shared boundary.
    #[must_use]
    pub fn from_shared(boundary: Arc<dyn CallBoundary>, options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                boundary,
                state: Mutex::new(ClientState::Uninitialized),
                readiness: Arc::new(Readiness::new()),
                options,
            }),
        }
    }

    /// Creates an uninitialized client connected to `registry`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn connect(registry: &Registry) -> Self {
        let connection = Connection::to_registry(registry.clone(), ConnectionOptions::default());
        Self::new(connection)
    }
}

// ============================================================================
// BridgeClient - Accessors
// ============================================================================

impl BridgeClient {
    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.inner.state.lock()
    }

    /// Returns the handle while open.
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        match self.state() {
            ClientState::Open(handle) => Some(handle),
            _ => None,
        }
    }

    /// Returns `true` if open and the page has settled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state(), ClientState::Open(_)) && self.inner.readiness.is_ready()
    }

    /// Returns the client options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }
}

// ============================================================================
// BridgeClient - Internal
// ============================================================================

impl BridgeClient {
    /// Returns the open handle, or the state-precondition error.
    pub(crate) fn open_handle(&self) -> Result<Handle> {
        match self.state() {
            ClientState::Open(handle) => Ok(handle),
            ClientState::Closed => Err(Error::Closed),
            ClientState::Uninitialized | ClientState::Opening => Err(Error::NotInitialized),
        }
    }

    /// Waits for readiness, then re-checks that the client is still open.
    pub(crate) async fn ready_handle(&self) -> Result<Handle> {
        self.wait_for_ready().await?;
        self.open_handle()
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let ClientState::Open(handle) = *self.state.get_mut() {
            debug!(%handle, "Client dropped while open");
            self.readiness.close();
            spawn_close(&self.boundary, handle);
        }
    }
}

/// Sends a close for `handle` without awaiting it.
///
/// The outcome is logged and otherwise discarded.
pub(crate) fn spawn_close(boundary: &Arc<dyn CallBoundary>, handle: Handle) {
    let Ok(runtime) = RuntimeHandle::try_current() else {
        warn!(%handle, "No runtime to send close, context left open");
        return;
    };

    let boundary = Arc::clone(boundary);
    runtime.spawn(async move {
        match boundary.invoke(Call::Close { handle }).await {
            Ok(_) => debug!(%handle, "Context closed"),
            Err(e) => debug!(%handle, error = %e, "Close discarded"),
        }
    });
}

// ============================================================================
// Tests
// ============================================================================
