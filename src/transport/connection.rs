//! Caller-side connection and event loop.
//!
//! This module correlates outgoing calls with the replies that come back
//! from the host side, bounding both the number of calls in flight and the
//! time each one may take.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Outgoing calls from the client API
//! - Incoming replies from the dispatcher
//! - Call/reply correlation by [`CallId`]
//! - Failing every pending call when either side goes away

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, saturating_millis};
use crate::host::Registry;
use crate::identifiers::CallId;
use crate::protocol::{Call, Envelope, HostMessage, Outcome, Reply};

use super::boundary::CallBoundary;
use super::dispatcher::Dispatcher;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for one call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on calls awaiting a reply.
pub const DEFAULT_MAX_PENDING_CALLS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of call IDs to reply channels.
type CorrelationMap = FxHashMap<CallId, oneshot::Sender<Result<Outcome>>>;

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Limits applied by a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Timeout for every call except `onReady`.
    pub call_timeout: Duration,

    /// Calls allowed in flight before new ones are rejected.
    pub max_pending_calls: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_pending_calls: DEFAULT_MAX_PENDING_CALLS,
        }
    }
}

impl ConnectionOptions {
    /// Creates options with defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call timeout.
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Sets the pending-call cap.
    #[inline]
    #[must_use]
    pub fn with_max_pending_calls(mut self, max: usize) -> Self {
        self.max_pending_calls = max;
        self
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a call and register its reply channel.
    Send {
        envelope: Envelope,
        reply_tx: oneshot::Sender<Result<Outcome>>,
    },
    /// Drop a correlation entry after its caller gave up, and cancel the
    /// call on the host side.
    RemoveCorrelation(CallId),
    /// Stop the event loop.
    Shutdown,
}

// ============================================================================
// PendingCall
// ============================================================================

/// Releases a call's correlation entry unless its reply was received.
///
/// Covers both a call timeout and an `exchange` future dropped mid-flight.
struct PendingCall<'a> {
    command_tx: &'a mpsc::UnboundedSender<ConnectionCommand>,
    call_id: CallId,
    answered: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.answered {
            let _ = self
                .command_tx
                .send(ConnectionCommand::RemoveCorrelation(self.call_id));
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Caller-side end of the call boundary.
///
/// Handles call/reply correlation. The connection spawns an internal event
/// loop task; clones share it.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and can be shared across tasks.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Limits.
    options: ConnectionOptions,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pending", &self.pending_count())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a connection over a host message sink and a reply stream.
    ///
    /// Spawns the event loop task internally.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(
        host_tx: mpsc::UnboundedSender<HostMessage>,
        reply_rx: mpsc::UnboundedReceiver<Reply>,
        options: ConnectionOptions,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));

        tokio::spawn(Self::run_event_loop(
            host_tx,
            reply_rx,
            command_rx,
            Arc::clone(&correlation),
        ));

        Self {
            command_tx,
            correlation,
            options,
        }
    }

    /// Connects to `registry` through a [`Dispatcher`] task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn to_registry(registry: Registry, options: ConnectionOptions) -> Self {
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        tokio::spawn(Dispatcher::new(registry).serve(host_rx, reply_tx));

        Self::new(host_tx, reply_rx, options)
    }

    /// Sends a call and waits for its payload.
    ///
    /// `onReady` waits without a call timeout; its bound comes from the
    /// host's ready timeout. Every other call uses the configured timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::CallTimeout`] if no reply arrives within the timeout
    /// - [`Error::Protocol`] if too many calls are pending
    /// - any error the host side reported for the call
    pub async fn send(&self, call: Call) -> Result<Value> {
        if call.is_unbounded() {
            self.exchange(call, None).await
        } else {
            self.exchange(call, Some(self.options.call_timeout)).await
        }
    }

    /// Sends a call and waits for its payload with a custom timeout.
    ///
    /// # Errors
    ///
    /// See [`Connection::send`].
    pub async fn send_with_timeout(&self, call: Call, call_timeout: Duration) -> Result<Value> {
        self.exchange(call, Some(call_timeout)).await
    }

    /// Returns the number of calls awaiting a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns the connection limits.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Shuts down the connection, failing every pending call.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// Connection - Internal
// ============================================================================

impl Connection {
    /// Registers, sends, and awaits one call.
    async fn exchange(&self, call: Call, call_timeout: Option<Duration>) -> Result<Value> {
        // Check pending call limit
        {
            let correlation = self.correlation.lock();
            if correlation.len() >= self.options.max_pending_calls {
                warn!(
                    pending = correlation.len(),
                    max = self.options.max_pending_calls,
                    "Too many pending calls"
                );
                return Err(Error::protocol(format!(
                    "Too many pending calls: {}/{}",
                    correlation.len(),
                    self.options.max_pending_calls
                )));
            }
        }

        let envelope = Envelope::new(call.clone());
        let call_id = envelope.id;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send { envelope, reply_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        let mut pending = PendingCall {
            command_tx: &self.command_tx,
            call_id,
            answered: false,
        };

        let received = match call_timeout {
            Some(limit) => match timeout(limit, reply_rx).await {
                Ok(received) => received,
                Err(_) => {
                    let timeout_ms = saturating_millis(limit);
                    debug!(%call_id, method = call.method(), timeout_ms, "Call timed out");
                    return Err(Error::call_timeout(call_id, timeout_ms));
                }
            },
            None => reply_rx.await,
        };
        pending.answered = true;

        let outcome = received.map_err(|_| Error::ConnectionClosed)??;
        outcome.map_err(|failure| failure.into_error(&call))
    }

    /// Event loop that moves calls out and replies in.
    async fn run_event_loop(
        host_tx: mpsc::UnboundedSender<HostMessage>,
        mut reply_rx: mpsc::UnboundedReceiver<Reply>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
    ) {
        loop {
            tokio::select! {
                // Replies from the host side
                reply = reply_rx.recv() => {
                    match reply {
                        Some(reply) => Self::handle_reply(reply, &correlation),

                        None => {
                            debug!("Host side closed");
                            break;
                        }
                    }
                }

                // Commands from the client API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { envelope, reply_tx }) => {
                            Self::handle_send_command(envelope, reply_tx, &host_tx, &correlation);
                        }

                        Some(ConnectionCommand::RemoveCorrelation(call_id)) => {
                            if correlation.lock().remove(&call_id).is_some() {
                                let _ = host_tx.send(HostMessage::Cancel(call_id));
                                debug!(%call_id, "Removed abandoned correlation");
                            }
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Fail all pending calls on shutdown
        Self::fail_pending_calls(&correlation);

        debug!("Event loop terminated");
    }

    /// Routes a reply to the caller waiting on it.
    fn handle_reply(reply: Reply, correlation: &Arc<Mutex<CorrelationMap>>) {
        let tx = correlation.lock().remove(&reply.id);

        match tx {
            Some(tx) => {
                trace!(id = %reply.id, ok = reply.outcome.is_ok(), "Reply received");
                let _ = tx.send(Ok(reply.outcome));
            }
            None => warn!(id = %reply.id, "Reply for unknown call"),
        }
    }

    /// Registers a call and hands it to the host side.
    fn handle_send_command(
        envelope: Envelope,
        reply_tx: oneshot::Sender<Result<Outcome>>,
        host_tx: &mpsc::UnboundedSender<HostMessage>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let call_id = envelope.id;
        let method = envelope.call.method();

        // Store correlation before sending
        correlation.lock().insert(call_id, reply_tx);

        if host_tx.send(HostMessage::Call(envelope)).is_err() {
            // Remove correlation and notify caller
            if let Some(tx) = correlation.lock().remove(&call_id) {
                let _ = tx.send(Err(Error::ConnectionClosed));
            }
            return;
        }

        trace!(%call_id, method, "Call sent");
    }

    /// Fails all pending calls with ConnectionClosed error.
    fn fail_pending_calls(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending calls on shutdown");
        }
    }
}

#[async_trait]
impl CallBoundary for Connection {
    async fn invoke(&self, call: Call) -> Result<Value> {
        self.send(call).await
    }
}

// ============================================================================
// Tests
// ============================================================================
