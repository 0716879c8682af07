//! Address and navigation methods.

use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result, saturating_millis};
use crate::protocol::Call;
use crate::protocol::outcome::decode_optional_string;

use super::BridgeClient;

// ============================================================================
// BridgeClient - Navigation
// ============================================================================

impl BridgeClient {
    /// Returns the page's current address once it is ready.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if the client was closed
    /// - [`Error::UnknownHandle`] if the context was closed in the registry
    pub async fn get_url(&self) -> Result<Option<String>> {
        let handle = self.ready_handle().await?;

        let payload = self.inner.boundary.invoke(Call::GetUrl { handle }).await?;
        decode_optional_string(payload)
    }

    /// Waits for a navigation the page was just told to perform.
    ///
    /// Call after a script triggers a navigation. Readiness is reset for
    /// the duration, so concurrent `evaluate`/`get_url` calls wait for the
    /// new page instead of racing the old one. The host tolerates a
    /// navigation that has not started yet by the first sample.
    ///
    /// The round runs in its own task: dropping this future stops the wait
    /// but the page still becomes ready once the host answers.
    ///
    /// # Example
    ///
    /// ```ignore
    /// client.evaluate_value("location.href = '/next'").await?;
    /// client.wait_for_navigation().await?;
    /// let url = client.get_url().await?;
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if the client was closed
    /// - [`Error::Timeout`] if a ready timeout is configured and elapses;
    ///   the round is abandoned and readiness is marked failed
    /// - any error the host reports; readiness is then marked failed
    pub async fn wait_for_navigation(&self) -> Result<()> {
        let handle = self.ready_handle().await?;
        self.inner.readiness.reset();
        debug!(%handle, "Waiting for navigation");

        let round = self.spawn_readiness_round(handle, true);
        let abort = round.abort_handle();

        let joined = match self.inner.options.ready_timeout {
            Some(limit) => match timeout(limit, round).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    let err = Error::timeout("waiting for navigation", saturating_millis(limit));
                    debug!(%handle, error = %err, "Navigation abandoned");

                    // The round may have settled just before the abort.
                    if self.inner.readiness.fail(err.to_string()) {
                        return Err(err);
                    }
                    return self.inner.readiness.terminal_error().map_or(Ok(()), Err);
                }
            },
            None => round.await,
        };

        joined.map_err(|e| Error::readiness_failed(format!("readiness round ended: {e}")))?
    }
}

// ============================================================================
// Tests
// ============================================================================
