//! Type-safe identifiers.
//!
//! Newtype wrappers keep handles and call ids from being mixed up with
//! plain integers or strings.
//!
//! | Type | Wraps | Issued by |
//! |------|-------|-----------|
//! | [`Handle`] | `NonZeroU32` | Registry |
//! | [`CallId`] | `Uuid` | Connection |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Handle
// ============================================================================

/// Opaque capability identifying one live browsing context.
///
/// Handles are always positive. Only the registry allocates them; a client
/// holds a copy and must never assume the context behind it is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(NonZeroU32);

impl Handle {
    /// Creates a handle from a raw value.
    ///
    /// Returns `None` for zero.
    #[inline]
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Returns the raw integer value.
    #[inline]
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Handle> for u32 {
    #[inline]
    fn from(handle: Handle) -> Self {
        handle.as_u32()
    }
}

// ============================================================================
// CallId
// ============================================================================

/// Correlates one boundary invocation with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    /// Generates a fresh random call id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
