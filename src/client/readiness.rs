//! Single-resolution readiness signal with a FIFO callback queue.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Callback run once the context is ready.
pub(crate) type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

/// Readiness phase.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    /// Handshake in flight; callbacks queue.
    Pending,
    /// Settled; callbacks run immediately.
    Ready,
    /// Handshake failed.
    Failed(String),
    /// Client closed. Terminal.
    Closed,
}

struct ReadinessState {
    phase: Phase,
    /// Callbacks registered through `on_ready`.
    queue: VecDeque<ReadyCallback>,
    /// Tasks parked in `wait_for_ready`.
    waiters: Vec<oneshot::Sender<()>>,
}

// ============================================================================
// Readiness
// ============================================================================

/// Readiness flag plus the callbacks and waiters parked on it.
///
/// Callbacks always run outside the lock, so a callback may subscribe
/// again or call back into the client.
///
/// Closing releases waiters at once but keeps queued callbacks: a
/// handshake that completes after the close still runs them, without the
/// signal ever reporting ready again.
pub(crate) struct Readiness {
    state: Mutex<ReadinessState>,
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Readiness")
            .field("phase", &state.phase)
            .field("queued", &state.queue.len())
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

impl Readiness {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ReadinessState {
                phase: Phase::Pending,
                queue: VecDeque::new(),
                waiters: Vec::new(),
            }),
        }
    }

    /// Runs `callback` now if ready, otherwise queues it.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadinessFailed`] if the handshake failed
    /// - [`Error::Closed`] if the client is closed
    pub(crate) fn subscribe(&self, callback: ReadyCallback) -> Result<()> {
        let mut state = self.state.lock();
        match state.phase.clone() {
            Phase::Ready => {
                drop(state);
                callback();
                Ok(())
            }
            Phase::Pending => {
                state.queue.push_back(callback);
                Ok(())
            }
            Phase::Failed(message) => Err(Error::readiness_failed(message)),
            Phase::Closed => Err(Error::Closed),
        }
    }

    /// Parks a waiter until the next transition.
    ///
    /// Returns `None` if already ready. The receiver completes on ready and
    /// errors on failure or close; [`Readiness::terminal_error`] says which.
    ///
    /// # Errors
    ///
    /// Same as [`Readiness::subscribe`].
    pub(crate) fn waiter(&self) -> Result<Option<oneshot::Receiver<()>>> {
        let mut state = self.state.lock();
        match state.phase.clone() {
            Phase::Ready => Ok(None),
            Phase::Pending => {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Ok(Some(rx))
            }
            Phase::Failed(message) => Err(Error::readiness_failed(message)),
            Phase::Closed => Err(Error::Closed),
        }
    }

    /// Marks the context ready, drains queued callbacks in order, then
    /// wakes waiters.
    ///
    /// Once closed the phase stays closed, but callbacks queued before the
    /// close still run. Returns the number of callbacks run.
    pub(crate) fn mark_ready(&self) -> usize {
        let (drained, waiters) = {
            let mut state = self.state.lock();
            if state.phase != Phase::Closed {
                state.phase = Phase::Ready;
            }
            (
                std::mem::take(&mut state.queue),
                std::mem::take(&mut state.waiters),
            )
        };

        let count = drained.len();
        for callback in drained {
            callback();
        }

        for waiter in waiters {
            let _ = waiter.send(());
        }
        count
    }

    /// Returns to pending ahead of a new readiness round.
    ///
    /// Queued callbacks are kept. No-op once closed.
    pub(crate) fn reset(&self) {
        let mut state = self.state.lock();
        if state.phase != Phase::Closed {
            state.phase = Phase::Pending;
        }
    }

    /// Records a failed round, dropping queued callbacks and waiters.
    ///
    /// Only a pending round can fail; returns whether this one did. Once
    /// closed the phase stays closed and the leftover callbacks are dropped.
    pub(crate) fn fail(&self, message: impl Into<String>) -> bool {
        let (failed, dropped, waiters) = {
            let mut state = self.state.lock();
            let failed = match state.phase.clone() {
                Phase::Pending => {
                    state.phase = Phase::Failed(message.into());
                    true
                }
                Phase::Closed => false,
                Phase::Ready | Phase::Failed(_) => return false,
            };
            (
                failed,
                std::mem::take(&mut state.queue),
                std::mem::take(&mut state.waiters),
            )
        };
        drop(waiters);
        drop(dropped);
        failed
    }

    /// Closes the signal, releasing waiters.
    ///
    /// Queued callbacks stay queued for a handshake already in flight.
    pub(crate) fn close(&self) {
        let waiters = {
            let mut state = self.state.lock();
            state.phase = Phase::Closed;
            std::mem::take(&mut state.waiters)
        };
        drop(waiters);
    }

    #[inline]
    pub(crate) fn is_ready(&self) -> bool {
        self.state.lock().phase == Phase::Ready
    }

    /// Error describing why readiness can no longer arrive, if any.
    pub(crate) fn terminal_error(&self) -> Option<Error> {
        match &self.state.lock().phase {
            Phase::Failed(message) => Some(Error::readiness_failed(message.clone())),
            Phase::Closed => Some(Error::Closed),
            Phase::Pending | Phase::Ready => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
