//! JavaScript execution methods.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::outcome::decode_optional_string;
use crate::protocol::{Call, script};

use super::BridgeClient;

// ============================================================================
// BridgeClient - Script Execution
// ============================================================================

impl BridgeClient {
    /// Runs `script` once the page is ready and deserializes its result.
    ///
    /// The script should use `return` to produce a value; a missing or
    /// `undefined` result arrives as JSON `null`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let sum: i64 = client.evaluate("return 1+1").await?;
    /// let title: String = client.evaluate("return document.title").await?;
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::ScriptError`] if the script raised
    /// - [`Error::Serialization`] if the result does not fit `T`
    /// - [`Error::UnknownHandle`] if the context was closed in the registry
    /// - [`Error::Closed`] if the client was closed
    pub async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let value = self.evaluate_value(script).await?;
        serde_json::from_value(value).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Runs `script` once the page is ready and returns its result as JSON.
    ///
    /// # Errors
    ///
    /// See [`BridgeClient::evaluate`].
    pub async fn evaluate_value(&self, script: &str) -> Result<Value> {
        let handle = self.ready_handle().await?;
        debug!(%handle, script_len = script.len(), "Executing script");

        let payload = self
            .inner
            .boundary
            .invoke(Call::Evaluate {
                handle,
                script: script::wrap(script),
            })
            .await?;

        let value = match decode_optional_string(payload)? {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                Error::serialization(format!("script result is not JSON: {e}"))
            })?,
            None => Value::Null,
        };

        debug!(%handle, "Script executed");
        Ok(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
