//! Headless WebView - off-screen browsing contexts behind an async bridge.
//!
//! This library lets an application open an off-screen browsing context,
//! navigate it, wait until the page has settled, run script inside it, and
//! read its state, all through an asynchronous call boundary.
//!
//! # Architecture
//!
//! Two sides cooperate across the boundary:
//!
//! - **Host side**: the [`Registry`] owns every context on one dedicated
//!   thread and polls them for readiness
//! - **Caller side**: each [`BridgeClient`] drives one context and holds
//!   callers back until its page is ready
//!
//! Key design principles:
//!
//! - Contexts are confined to the registry thread (actor, no shared locks)
//! - Handles are capabilities; every use re-validates against the registry
//! - Readiness is polled on a timer, never spun
//! - Every boundary failure carries an [`ErrorKind`] plus a stable message
//!
//! # Quick Start
//!
//! ```no_run
//! use headless_webview::{BridgeClient, Registry, Result, SimulatedEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Start the registry thread with a browsing engine
//!     let registry = Registry::builder()
//!         .engine(SimulatedEngine::new())
//!         .spawn()?;
//!
//!     // Open a context through the call boundary
//!     let client = BridgeClient::connect(&registry);
//!     client.init("https://example.com").await?;
//!
//!     // Operations wait for the page to settle
//!     let url = client.get_url().await?;
//!     println!("Loaded: {url:?}");
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Caller-side [`BridgeClient`] |
//! | [`engine`] | Browsing engine traits and [`SimulatedEngine`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | [`Registry`] and readiness poller |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Boundary call and outcome types |
//! | [`transport`] | Call boundary, connection, dispatcher |

// ============================================================================
// Modules
// ============================================================================

/// Caller-side bridge client.
///
/// Use [`BridgeClient::connect`] to drive a context in a [`Registry`].
pub mod client;

/// Browsing engine abstraction.
///
/// Implement [`Engine`] and [`BrowsingContext`] to plug in a real engine.
pub mod engine;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host side: instance registry and readiness poller.
///
/// Use [`Registry::builder()`] to spawn a configured registry.
pub mod host;

/// Type-safe identifiers.
///
/// Newtype wrappers for context handles and call ids.
pub mod identifiers;

/// Boundary message types.
///
/// Calls, outcomes, and the result-capturing script wrapper.
pub mod protocol;

/// Call boundary transport.
///
/// The [`CallBoundary`] seam and its channel-based implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{BridgeClient, ClientOptions, ClientState};

// Engine types
pub use engine::{BrowsingContext, Engine, ScriptResponse, SimulatedEngine, SimulatedPage};

// Error types
pub use error::{Error, ErrorKind, Result};

// Host types
pub use host::{HandleAllocation, PollOptions, PollReport, Registry, RegistryBuilder, RegistryOptions};

// Identifier types
pub use identifiers::{CallId, Handle};

// Protocol types
pub use protocol::{Call, Failure, Outcome};

// Transport types
pub use transport::{CallBoundary, Connection, ConnectionOptions, Dispatcher};
