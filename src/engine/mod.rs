//! Browsing engine abstraction.
//!
//! The registry never talks to a concrete web engine directly. It drives
//! contexts through the [`BrowsingContext`] trait and obtains new ones from an
//! [`Engine`]. Both live on the registry thread, so contexts need not be
//! `Send`; only the engine factory crosses threads once, at spawn time.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Engine`] | Factory for browsing contexts |
//! | [`BrowsingContext`] | One off-screen page |
//! | [`SimulatedEngine`] | Deterministic in-memory engine |

// ============================================================================
// Imports
// ============================================================================

use futures_util::future::LocalBoxFuture;
use serde_json::Value;
use url::Url;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Deterministic in-memory engine.
pub mod simulated;

// ============================================================================
// Re-exports
// ============================================================================

pub use simulated::{ScriptResponse, SimulatedEngine, SimulatedPage};

// ============================================================================
// Types
// ============================================================================

/// Outcome of one script evaluation.
///
/// `Ok(None)` means the script produced no value; `Err` carries the engine's
/// error description.
pub type ScriptResult = std::result::Result<Option<Value>, String>;

/// Completion of a script evaluation, polled on the registry thread.
pub type ScriptFuture = LocalBoxFuture<'static, ScriptResult>;

// ============================================================================
// BrowsingContext
// ============================================================================

/// One embedded, off-screen page.
pub trait BrowsingContext {
    /// Attaches the context to its host surface.
    fn attach(&mut self);

    /// Starts an asynchronous navigation to `url`.
    ///
    /// Must return before the page has loaded.
    fn load(&mut self, url: &Url);

    /// Reports whether a navigation is in flight.
    fn is_loading(&self) -> bool;

    /// Returns the current address, if any.
    fn url(&self) -> Option<Url>;

    /// Runs `script` in the page and resolves with its result.
    fn evaluate(&self, script: &str) -> ScriptFuture;

    /// Detaches the context from its host surface.
    fn detach(&mut self);
}

// ============================================================================
// Engine
// ============================================================================

/// Factory for browsing contexts.
///
/// Moved onto the registry thread when the registry spawns.
pub trait Engine: Send + 'static {
    /// Creates a fresh, unattached browsing context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`](crate::Error::Engine) if the engine cannot
    /// provide a context.
    fn create_context(&mut self) -> Result<Box<dyn BrowsingContext>>;
}
