//! Caller-side bridge client.
//!
//! Each [`BridgeClient`] drives one browsing context through the call
//! boundary and keeps callers from racing a page that is still loading.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | BridgeClient struct, state, accessors |
//! | `lifecycle` | init, readiness, close |
//! | `navigation` | Current address, navigation waits |
//! | `options` | Client settings |
//! | `readiness` | Ready flag and callback queue |
//! | `script` | JavaScript execution |
//!
//! # Example
//!
//! ```ignore
//! let client = BridgeClient::connect(&registry);
//! client.init("https://example.com").await?;
//!
//! client.on_ready(|| println!("page settled"))?;
//! let sum: i64 = client.evaluate("return 1+1").await?;
//!
//! client.evaluate_value("location.href = '/next'").await?;
//! client.wait_for_navigation().await?;
//!
//! client.close();
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod lifecycle;
mod navigation;
mod options;
mod readiness;
mod script;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{BridgeClient, ClientState};
pub use options::ClientOptions;
