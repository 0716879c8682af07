//! Call outcomes.
//!
//! Each boundary invocation delivers exactly one outcome: a JSON payload on
//! success or a [`Failure`] carrying a discriminated [`ErrorKind`] next to the
//! human-readable message.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorKind};
use crate::identifiers::{CallId, Handle};

use super::Call;

// ============================================================================
// Types
// ============================================================================

/// Success payload or failure of one call.
pub type Outcome = std::result::Result<Value, Failure>;

// ============================================================================
// Failure
// ============================================================================

/// Failure payload of one call.
///
/// # Format
///
/// ```json
/// { "kind": "unknownHandle", "message": "Invalid WebView ID" }
/// { "kind": "timeout", "message": "waiting for 1 to finish loading", "timeoutMs": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    /// Discriminated error kind.
    pub kind: ErrorKind,
    /// Human-readable message, compatible with the historical text.
    pub message: String,
    /// How long the host waited, for timeouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Failure {
    /// Creates a failure.
    #[inline]
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timeout_ms: None,
        }
    }

    /// Records how long the host waited before timing out.
    #[inline]
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Rebuilds a crate error, taking handle and URL context from `call`.
    #[must_use]
    pub fn into_error(self, call: &Call) -> Error {
        match self.kind {
            ErrorKind::InvalidUrl => match call {
                Call::Open { url } => Error::invalid_url(url.clone()),
                _ => Error::invalid_url(self.message),
            },
            ErrorKind::UnknownHandle => match call.handle() {
                Some(handle) => Error::unknown_handle(handle),
                None => Error::protocol(self.message),
            },
            ErrorKind::ScriptError => Error::script_error(self.message),
            ErrorKind::Serialization => Error::serialization(self.message),
            ErrorKind::NotInitialized => Error::NotInitialized,
            ErrorKind::Closed => Error::Closed,
            ErrorKind::Timeout => match self.timeout_ms {
                Some(timeout_ms) => Error::timeout(self.message, timeout_ms),
                None => Error::protocol(format!("timeout without a duration: {}", self.message)),
            },
            ErrorKind::Engine => Error::engine(self.message),
            ErrorKind::Unavailable => Error::RegistryClosed,
            ErrorKind::Internal => Error::protocol(self.message),
        }
    }
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        let failure = Self::new(err.kind(), err.boundary_message());
        match err {
            Error::Timeout { timeout_ms, .. } | Error::CallTimeout { timeout_ms, .. } => {
                failure.with_timeout_ms(*timeout_ms)
            }
            _ => failure,
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// Reply
// ============================================================================

/// An outcome tagged with the id of the call it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Matches the envelope `id`.
    pub id: CallId,
    /// The outcome.
    pub outcome: Outcome,
}

// ============================================================================
// Payload Decoding
// ============================================================================

/// Decodes an `open` payload.
///
/// # Errors
///
/// Returns [`Error::Protocol`] unless the payload is a positive integer
/// that fits a handle.
pub fn decode_handle(payload: &Value) -> Result<Handle, Error> {
    payload
        .as_u64()
        .and_then(|raw| u32::try_from(raw).ok())
        .and_then(Handle::new)
        .ok_or_else(|| Error::protocol(format!("expected handle, got {payload}")))
}

/// Decodes a string-or-null payload.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for any other payload shape.
pub fn decode_optional_string(payload: Value) -> Result<Option<String>, Error> {
    match payload {
        Value::String(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => Err(Error::protocol(format!(
            "expected string or null, got {other}"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
