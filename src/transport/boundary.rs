//! The call boundary seam.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::Call;

// ============================================================================
// CallBoundary
// ============================================================================

/// An asynchronous request/response channel into the registry.
///
/// Each invocation resolves exactly once with the call's success payload or
/// the error the host side reported. Implementations decide how the call
/// travels; [`Connection`](super::Connection) correlates calls over
/// channels, while [`Dispatcher`](super::Dispatcher) answers in-process.
#[async_trait]
pub trait CallBoundary: Send + Sync {
    /// Invokes one call and waits for its outcome.
    async fn invoke(&self, call: Call) -> Result<Value>;
}
