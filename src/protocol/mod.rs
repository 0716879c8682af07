//! Call boundary message types.
//!
//! This module defines what crosses the boundary between the caller-side
//! client and the host-side registry. The wire encoding itself is not
//! specified; these types are passed as values and only serialize for
//! logging and inspection.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Envelope` | Caller → Host | Call tagged with a correlation id |
//! | `HostMessage` | Caller → Host | Envelope, or cancellation of one |
//! | `Reply` | Host → Caller | Outcome for one call id |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `call` | Call methods and envelope |
//! | `outcome` | Outcomes, failures, payload decoding |
//! | `script` | Result-capturing script wrapper |

// ============================================================================
// Submodules
// ============================================================================

/// Call methods and envelope.
pub mod call;

/// Outcomes and failures.
pub mod outcome;

/// Result-capturing script wrapper.
pub mod script;

// ============================================================================
// Re-exports
// ============================================================================

pub use call::{Call, Envelope, HostMessage};
pub use outcome::{Failure, Outcome, Reply};
