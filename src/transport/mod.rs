//! Call boundary transport.
//!
//! This module carries calls from the caller-side client to the host-side
//! registry and carries outcomes back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  BridgeClient   │                              │  Dispatcher     │
//! │                 │     HostMessage (mpsc)       │                 │
//! │  Connection     │─────────────────────────────►│  Registry       │
//! │                 │◄─────────────────────────────│                 │
//! │                 │     Reply (mpsc)             │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `boundary` | The [`CallBoundary`] trait |
//! | `connection` | Caller-side correlation and event loop |
//! | `dispatcher` | Host-side call dispatch |

// ============================================================================
// Submodules
// ============================================================================

/// The call boundary seam.
pub mod boundary;

/// Caller-side connection and event loop.
pub mod connection;

/// Host-side call dispatch.
pub mod dispatcher;

// ============================================================================
// Re-exports
// ============================================================================

pub use boundary::CallBoundary;
pub use connection::{Connection, ConnectionOptions};
pub use dispatcher::Dispatcher;
