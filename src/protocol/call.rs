//! Boundary calls.
//!
//! Every call is one of five methods. Serialized as
//! `{ "method": "...", "params": { ... } }`:
//!
//! | Method | Params | Success payload |
//! |--------|--------|-----------------|
//! | `open` | `url` | handle (integer) |
//! | `evaluate` | `handle`, `script` | JSON text or `null` |
//! | `getUrl` | `handle` | URL or `null` |
//! | `close` | `handle` | none |
//! | `onReady` | `handle`, `expectNavigation` | none |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{CallId, Handle};

// ============================================================================
// Call
// ============================================================================

/// One invocation across the call boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Call {
    /// Create a context and start loading `url`.
    #[serde(rename = "open")]
    Open {
        /// Address to load.
        url: String,
    },

    /// Run a pre-wrapped script.
    #[serde(rename = "evaluate")]
    Evaluate {
        /// Target context.
        handle: Handle,
        /// Script, already wrapped to yield JSON text.
        script: String,
    },

    /// Read the current address.
    #[serde(rename = "getUrl")]
    GetUrl {
        /// Target context.
        handle: Handle,
    },

    /// Detach and forget a context.
    #[serde(rename = "close")]
    Close {
        /// Target context.
        handle: Handle,
    },

    /// Answer once the context has settled.
    #[serde(rename = "onReady")]
    OnReady {
        /// Target context.
        handle: Handle,
        /// Wait for a navigation that may not have started yet.
        #[serde(
            rename = "expectNavigation",
            default,
            skip_serializing_if = "std::ops::Not::not"
        )]
        expect_navigation: bool,
    },
}

impl Call {
    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Evaluate { .. } => "evaluate",
            Self::GetUrl { .. } => "getUrl",
            Self::Close { .. } => "close",
            Self::OnReady { .. } => "onReady",
        }
    }

    /// Returns the target handle, if the call has one.
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Self::Open { .. } => None,
            Self::Evaluate { handle, .. }
            | Self::GetUrl { handle }
            | Self::Close { handle }
            | Self::OnReady { handle, .. } => Some(*handle),
        }
    }

    /// Returns `true` for calls that may legitimately wait indefinitely.
    #[inline]
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::OnReady { .. })
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// A call tagged with its correlation id.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "method": "evaluate",
///   "params": { "handle": 1, "script": "..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Correlation id.
    pub id: CallId,

    /// The call.
    #[serde(flatten)]
    pub call: Call,
}

impl Envelope {
    /// Wraps a call with a fresh id.
    #[inline]
    #[must_use]
    pub fn new(call: Call) -> Self {
        Self {
            id: CallId::generate(),
            call,
        }
    }
}

// ============================================================================
// HostMessage
// ============================================================================

/// Message from the caller side to the host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    /// Run a call and reply with its outcome.
    Call(Envelope),
    /// The caller stopped waiting; abandon the call if still running.
    Cancel(CallId),
}

impl From<Envelope> for HostMessage {
    #[inline]
    fn from(envelope: Envelope) -> Self {
        Self::Call(envelope)
    }
}

// ============================================================================
// Tests
// ============================================================================
