//! Error types for the headless webview bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use headless_webview::{BridgeClient, Result};
//!
//! async fn example(client: &BridgeClient) -> Result<()> {
//!     client.init("https://example.com").await?;
//!     let title: String = client.evaluate("return document.title").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Input | [`Error::InvalidUrl`], [`Error::Config`] |
//! | Handle | [`Error::UnknownHandle`] |
//! | Client state | [`Error::NotInitialized`], [`Error::AlreadyInitialized`], [`Error::Closed`], [`Error::ReadinessFailed`] |
//! | Execution | [`Error::ScriptError`], [`Error::Serialization`], [`Error::Timeout`] |
//! | Boundary | [`Error::CallTimeout`], [`Error::Protocol`], [`Error::ConnectionClosed`], [`Error::RegistryClosed`] |
//! | Engine | [`Error::Engine`] |
//! | External | [`Error::Io`] |
//!
//! Every error maps to a wire-level [`ErrorKind`] so failures can cross the
//! call boundary as a discriminated kind plus a human-readable message.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifiers::{CallId, Handle};

// ============================================================================
// Constants
// ============================================================================

/// Boundary message for rejected URLs.
pub const INVALID_URL_MESSAGE: &str = "Invalid URL";

/// Boundary message for unknown or closed handles.
pub const INVALID_HANDLE_MESSAGE: &str = "Invalid WebView ID";

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Input Errors
    // ========================================================================
    /// URL is not a well-formed absolute URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// The rejected input.
        url: String,
    },

    /// Configuration error.
    ///
    /// Returned when registry or client options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Handle Errors
    // ========================================================================
    /// Handle was never issued or has already been closed.
    #[error("Invalid WebView ID: {handle}")]
    UnknownHandle {
        /// The unknown handle.
        handle: Handle,
    },

    // ========================================================================
    // Client State Errors
    // ========================================================================
    /// Client operation before a successful `init`.
    #[error("The browser is not initialized")]
    NotInitialized,

    /// `init` called on a client that is opening or already open.
    #[error("The browser is already initialized")]
    AlreadyInitialized,

    /// Client operation after `close`.
    #[error("The browser is closed")]
    Closed,

    /// The readiness handshake failed while the client was still open.
    #[error("Readiness handshake failed: {message}")]
    ReadinessFailed {
        /// Description of the underlying failure.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Script raised an error inside the browsing context.
    #[error("Script error: {message}")]
    ScriptError {
        /// Error description reported by the engine.
        message: String,
    },

    /// Script result could not be represented as the requested value.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Operation exceeded its timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Boundary Errors
    // ========================================================================
    /// A boundary call received no outcome in time.
    #[error("Call {call_id} timed out after {timeout_ms}ms")]
    CallTimeout {
        /// The call that timed out.
        call_id: CallId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Malformed payload or unexpected outcome.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Caller-side connection to the boundary is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Registry loop has stopped.
    #[error("Registry closed")]
    RegistryClosed,

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The browsing engine could not create or attach a context.
    #[error("Engine error: {message}")]
    Engine {
        /// Description of the engine failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// ErrorKind
// ============================================================================

/// Discriminated error kind carried across the call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Malformed URL.
    InvalidUrl,
    /// Unknown or closed handle.
    UnknownHandle,
    /// Script raised an error.
    ScriptError,
    /// Result not representable.
    Serialization,
    /// Client not initialized.
    NotInitialized,
    /// Client closed.
    Closed,
    /// Timed out.
    Timeout,
    /// Engine could not provide a context.
    Engine,
    /// Registry has stopped.
    Unavailable,
    /// Anything else.
    Internal,
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an unknown handle error.
    #[inline]
    pub fn unknown_handle(handle: Handle) -> Self {
        Self::UnknownHandle { handle }
    }

    /// Creates a readiness failure error.
    #[inline]
    pub fn readiness_failed(message: impl Into<String>) -> Self {
        Self::ReadinessFailed {
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    #[inline]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a call timeout error.
    #[inline]
    pub fn call_timeout(call_id: CallId, timeout_ms: u64) -> Self {
        Self::CallTimeout {
            call_id,
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an engine error.
    #[inline]
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
#[inline]
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the wire-level kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::UnknownHandle { .. } => ErrorKind::UnknownHandle,
            Self::ScriptError { .. } => ErrorKind::ScriptError,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::Closed => ErrorKind::Closed,
            Self::Timeout { .. } | Self::CallTimeout { .. } => ErrorKind::Timeout,
            Self::Engine { .. } => ErrorKind::Engine,
            Self::RegistryClosed => ErrorKind::Unavailable,
            _ => ErrorKind::Internal,
        }
    }

    /// Returns the message sent across the boundary for this error.
    ///
    /// Handle and URL failures keep their fixed compatibility text.
    #[must_use]
    pub fn boundary_message(&self) -> String {
        match self {
            Self::InvalidUrl { .. } => INVALID_URL_MESSAGE.to_string(),
            Self::UnknownHandle { .. } => INVALID_HANDLE_MESSAGE.to_string(),
            Self::ScriptError { message } => message.clone(),
            Self::Timeout { operation, .. } => operation.clone(),
            other => other.to_string(),
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::CallTimeout { .. })
    }

    /// Returns `true` if the handle is unknown to the registry.
    #[inline]
    #[must_use]
    pub fn is_handle_error(&self) -> bool {
        matches!(self, Self::UnknownHandle { .. })
    }

    /// Returns `true` if this is a client state-precondition violation.
    #[inline]
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized | Self::AlreadyInitialized | Self::Closed
        )
    }

    /// Returns `true` if the boundary or registry loop is gone.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::RegistryClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: u32) -> Handle {
        Handle::new(id).expect("non-zero handle")
    }

    #[test]
    fn test_error_display() {
        let err = Error::invalid_url("not a url");
        assert_eq!(err.to_string(), "Invalid URL: not a url");

        let err = Error::unknown_handle(handle(4));
        assert_eq!(err.to_string(), "Invalid WebView ID: 4");
    }

    #[test]
    fn test_boundary_message_keeps_compat_text() {
        assert_eq!(
            Error::invalid_url("x").boundary_message(),
            INVALID_URL_MESSAGE
        );
        assert_eq!(
            Error::unknown_handle(handle(1)).boundary_message(),
            INVALID_HANDLE_MESSAGE
        );
        assert_eq!(
            Error::script_error("ReferenceError: foo").boundary_message(),
            "ReferenceError: foo"
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::invalid_url("x").kind(), ErrorKind::InvalidUrl);
        assert_eq!(Error::unknown_handle(handle(2)).kind(), ErrorKind::UnknownHandle);
        assert_eq!(Error::Closed.kind(), ErrorKind::Closed);
        assert_eq!(Error::timeout("poll", 10).kind(), ErrorKind::Timeout);
        assert_eq!(Error::RegistryClosed.kind(), ErrorKind::Unavailable);
        assert_eq!(Error::engine("gone").kind(), ErrorKind::Engine);
        assert_eq!(Error::protocol("bad").kind(), ErrorKind::Internal);

        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        assert_eq!(Error::from(json_err).kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_error_kind_serializes_camel_case() {
        let json = serde_json::to_string(&ErrorKind::UnknownHandle).expect("serialize");
        assert_eq!(json, "\"unknownHandle\"");
    }

    #[test]
    fn test_predicates() {
        assert!(Error::timeout("wait", 1).is_timeout());
        assert!(Error::call_timeout(CallId::generate(), 1).is_timeout());
        assert!(!Error::Closed.is_timeout());

        assert!(Error::unknown_handle(handle(1)).is_handle_error());
        assert!(Error::NotInitialized.is_state_error());
        assert!(Error::Closed.is_state_error());
        assert!(!Error::RegistryClosed.is_state_error());
        assert!(Error::RegistryClosed.is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
    }

    #[test]
    fn test_timeout_crosses_boundary_as_operation() {
        let err = Error::timeout("waiting for navigation", 250);
        assert_eq!(err.boundary_message(), "waiting for navigation");
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_saturating_millis() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(std::io::ErrorKind::Other, "thread spawn failed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
