//! Script wrapping for result capture.
//!
//! The client wraps every script as an immediately-invoked function whose
//! return value is JSON-stringified, substituting `null` for `undefined`:
//!
//! ```text
//! JSON.stringify((() => { <body> }) () ?? null);
//! ```
//!
//! The result channel therefore always carries a JSON document or `null`.

// ============================================================================
// Constants
// ============================================================================

const WRAP_PREFIX: &str = "JSON.stringify((() => { ";
const WRAP_SUFFIX: &str = " }) () ?? null);";

// ============================================================================
// Functions
// ============================================================================

/// Wraps a script body so its return value is captured as JSON.
///
/// The body should use `return` to produce a value.
#[must_use]
pub fn wrap(body: &str) -> String {
    let mut script = String::with_capacity(WRAP_PREFIX.len() + body.len() + WRAP_SUFFIX.len());
    script.push_str(WRAP_PREFIX);
    script.push_str(body);
    script.push_str(WRAP_SUFFIX);
    script
}

/// Returns the body of a script produced by [`wrap`].
///
/// Returns `None` for scripts that were not wrapped.
#[must_use]
pub fn unwrap(script: &str) -> Option<&str> {
    script
        .strip_prefix(WRAP_PREFIX)
        .and_then(|rest| rest.strip_suffix(WRAP_SUFFIX))
}

// ============================================================================
// Tests
// ============================================================================
