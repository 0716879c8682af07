//! Host side of the bridge.
//!
//! Everything here runs next to the browsing engine: the instance registry
//! that owns contexts, and the readiness poller that watches them load.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `allocator` | Handle allocation policies |
//! | `builder` | Fluent registry configuration |
//! | `options` | Registry and poller settings |
//! | `poller` | Fixed-interval readiness polling |
//! | `registry` | Handle → context arena on a dedicated thread |

// ============================================================================
// Submodules
// ============================================================================

/// Handle allocation policies.
pub mod allocator;

/// Fluent builder for [`Registry`].
pub mod builder;

/// Registry and poller settings.
pub mod options;

/// Fixed-interval readiness polling.
pub mod poller;

/// Handle → context arena.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use allocator::HandleAllocation;
pub use builder::RegistryBuilder;
pub use options::RegistryOptions;
pub use poller::{PollOptions, PollReport};
pub use registry::Registry;
