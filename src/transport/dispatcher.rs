//! Host-side call dispatch.
//!
//! Turns boundary [`Call`]s into [`Registry`] operations and shapes the
//! results into the payloads each method promises. Every call gets exactly
//! one [`Outcome`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::error::Result;
use crate::host::Registry;
use crate::identifiers::CallId;
use crate::protocol::{Call, Envelope, Failure, HostMessage, Outcome, Reply};

use super::boundary::CallBoundary;

// ============================================================================
// Types
// ============================================================================

/// Calls being served, by id.
type InFlight = FxHashMap<CallId, AbortHandle>;

// ============================================================================
// Dispatcher
// ============================================================================

/// Answers boundary calls against a registry.
///
/// Also usable directly as an in-process [`CallBoundary`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    /// Creates a dispatcher for `registry`.
    #[inline]
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Returns the registry calls are dispatched to.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs one call and produces its outcome.
    pub async fn dispatch(&self, call: Call) -> Outcome {
        let method = call.method();

        let result = self.run(call).await;
        if let Err(e) = &result {
            debug!(method, error = %e, "Call failed");
        }

        result.map_err(Failure::from)
    }

    /// Answers calls from `inbound` on `outbound` until `inbound` closes.
    ///
    /// Each call runs as its own task, so a long readiness wait never
    /// delays other calls. Replies go out in completion order. A
    /// [`HostMessage::Cancel`] aborts its call if it is still running, and
    /// calls still running when `inbound` closes are aborted too.
    pub async fn serve(
        self,
        mut inbound: mpsc::UnboundedReceiver<HostMessage>,
        outbound: mpsc::UnboundedSender<Reply>,
    ) {
        let in_flight: Arc<Mutex<InFlight>> = Arc::default();

        while let Some(message) = inbound.recv().await {
            match message {
                HostMessage::Call(Envelope { id, call }) => {
                    trace!(%id, method = call.method(), "Call received");

                    let dispatcher = self.clone();
                    let outbound = outbound.clone();
                    let finished = Arc::clone(&in_flight);

                    // Held across the spawn so the task cannot unregister
                    // itself before it is registered.
                    let mut tasks = in_flight.lock();
                    let task = tokio::spawn(async move {
                        let outcome = dispatcher.dispatch(call).await;
                        finished.lock().remove(&id);
                        if outbound.send(Reply { id, outcome }).is_err() {
                            trace!(%id, "Caller gone, dropping reply");
                        }
                    });
                    tasks.insert(id, task.abort_handle());
                }

                HostMessage::Cancel(id) => {
                    let task = in_flight.lock().remove(&id);
                    if let Some(task) = task {
                        task.abort();
                        debug!(%id, "Call cancelled");
                    }
                }
            }
        }

        let abandoned: Vec<_> = in_flight.lock().drain().collect();
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "Aborting calls on inbound close");
        }
        for (_, task) in abandoned {
            task.abort();
        }

        debug!("Dispatcher inbound closed");
    }

    /// Maps a call onto the registry.
    async fn run(&self, call: Call) -> Result<Value> {
        match call {
            Call::Open { url } => {
                let handle = self.registry.open(&url).await?;
                Ok(Value::from(handle.as_u32()))
            }

            Call::Evaluate { handle, script } => {
                match self.registry.evaluate(handle, &script).await? {
                    Some(Value::String(json)) => Ok(Value::String(json)),
                    Some(Value::Null) | None => Ok(Value::Null),
                    Some(other) => {
                        debug!(%handle, result = %other, "Script result is not JSON text");
                        Ok(Value::Null)
                    }
                }
            }

            Call::GetUrl { handle } => {
                let url = self.registry.get_url(handle).await?;
                Ok(url.map_or(Value::Null, Value::String))
            }

            Call::Close { handle } => {
                self.registry.close(handle).await?;
                Ok(Value::Null)
            }

            Call::OnReady {
                handle,
                expect_navigation,
            } => {
                let report = if expect_navigation {
                    self.registry.await_navigation(handle).await?
                } else {
                    self.registry.await_ready(handle).await?
                };
                trace!(%handle, samples = report.samples, "Ready answered");
                Ok(Value::Null)
            }
        }
    }
}

#[async_trait]
impl CallBoundary for Dispatcher {
    async fn invoke(&self, call: Call) -> Result<Value> {
        let outcome = self.dispatch(call.clone()).await;
        outcome.map_err(|failure| failure.into_error(&call))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::engine::SimulatedEngine;
    use crate::error::{ErrorKind, INVALID_HANDLE_MESSAGE, INVALID_URL_MESSAGE};
    use crate::identifiers::{CallId, Handle};
    use crate::protocol::script;

    fn dispatcher(engine: SimulatedEngine) -> Dispatcher {
        let registry = Registry::builder()
            .engine(engine)
            .poll_interval(Duration::from_millis(2))
            .spawn()
            .expect("spawn registry");
        Dispatcher::new(registry)
    }

    fn handle(id: u32) -> Handle {
        Handle::new(id).expect("non-zero")
    }

    #[tokio::test]
    async fn test_payload_shapes() {
        let engine = SimulatedEngine::new().respond("return 1+1", json!(2));
        let dispatcher = dispatcher(engine);

        let opened = dispatcher
            .dispatch(Call::Open {
                url: "https://example.com".to_string(),
            })
            .await
            .expect("open");
        assert_eq!(opened, json!(1));

        let ready = dispatcher
            .dispatch(Call::OnReady {
                handle: handle(1),
                expect_navigation: false,
            })
            .await
            .expect("ready");
        assert_eq!(ready, Value::Null);

        let evaluated = dispatcher
            .dispatch(Call::Evaluate {
                handle: handle(1),
                script: script::wrap("return 1+1"),
            })
            .await
            .expect("evaluate");
        assert_eq!(evaluated, json!("2"));

        let url = dispatcher
            .dispatch(Call::GetUrl { handle: handle(1) })
            .await
            .expect("url");
        assert_eq!(url, json!("https://example.com/"));

        let closed = dispatcher
            .dispatch(Call::Close { handle: handle(1) })
            .await
            .expect("close");
        assert_eq!(closed, Value::Null);
    }

    #[tokio::test]
    async fn test_failures_carry_kind_and_compat_message() {
        let dispatcher = dispatcher(SimulatedEngine::new());

        let failure = dispatcher
            .dispatch(Call::Open {
                url: "not a url".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::InvalidUrl);
        assert_eq!(failure.message, INVALID_URL_MESSAGE);

        for call in [
            Call::GetUrl { handle: handle(7) },
            Call::Close { handle: handle(7) },
            Call::OnReady {
                handle: handle(7),
                expect_navigation: false,
            },
            Call::Evaluate {
                handle: handle(7),
                script: script::wrap("return 1"),
            },
        ] {
            let failure = dispatcher.dispatch(call).await.unwrap_err();
            assert_eq!(failure.kind, ErrorKind::UnknownHandle);
            assert_eq!(failure.message, INVALID_HANDLE_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_raw_non_string_result_becomes_null() {
        let engine = SimulatedEngine::new().respond("document.title", json!({ "x": 1 }));
        let dispatcher = dispatcher(engine);
        dispatcher
            .dispatch(Call::Open {
                url: "https://example.com".to_string(),
            })
            .await
            .expect("open");

        let result = dispatcher
            .dispatch(Call::Evaluate {
                handle: handle(1),
                script: "document.title".to_string(),
            })
            .await
            .expect("evaluate");
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn test_invoke_restores_typed_error() {
        let dispatcher = dispatcher(SimulatedEngine::new());

        let err = dispatcher
            .invoke(Call::GetUrl { handle: handle(3) })
            .await
            .unwrap_err();
        assert!(err.is_handle_error());
    }

    #[tokio::test]
    async fn test_serve_answers_each_envelope() {
        let dispatcher = dispatcher(SimulatedEngine::new());
        let (envelope_tx, envelope_rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatcher.serve(envelope_rx, reply_tx));

        let open = Envelope::new(Call::Open {
            url: "https://example.com".to_string(),
        });
        let ghost = Envelope::new(Call::Close { handle: handle(9) });
        let ids: Vec<CallId> = vec![open.id, ghost.id];
        envelope_tx.send(open.into()).expect("send");
        envelope_tx.send(ghost.into()).expect("send");

        let mut replies = vec![
            reply_rx.recv().await.expect("reply"),
            reply_rx.recv().await.expect("reply"),
        ];
        replies.sort_by_key(|reply| ids.iter().position(|id| *id == reply.id));

        assert_eq!(replies[0].outcome, Ok(json!(1)));
        assert_eq!(
            replies[1].outcome.as_ref().unwrap_err().kind,
            ErrorKind::UnknownHandle
        );

        drop(envelope_tx);
        assert!(reply_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_host_poll() {
        let engine = SimulatedEngine::new().with_load_samples(u32::MAX);
        let dispatcher = dispatcher(engine.clone());
        dispatcher
            .dispatch(Call::Open {
                url: "https://example.com".to_string(),
            })
            .await
            .expect("open");

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatcher.serve(message_rx, reply_tx));

        let ready = Envelope::new(Call::OnReady {
            handle: handle(1),
            expect_navigation: false,
        });
        let id = ready.id;
        message_tx.send(ready.into()).expect("send");
        tokio::time::sleep(Duration::from_millis(20)).await;

        message_tx.send(HostMessage::Cancel(id)).expect("cancel");
        tokio::time::sleep(Duration::from_millis(10)).await;

        let page = engine.page(0).expect("page");
        let sampled = page.samples();
        assert!(sampled > 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(page.samples(), sampled);

        // No reply for a cancelled call.
        drop(message_tx);
        assert!(reply_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_inbound_close_aborts_running_calls() {
        let engine = SimulatedEngine::new().with_load_samples(u32::MAX);
        let dispatcher = dispatcher(engine.clone());
        dispatcher
            .dispatch(Call::Open {
                url: "https://example.com".to_string(),
            })
            .await
            .expect("open");

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let served = tokio::spawn(dispatcher.serve(message_rx, reply_tx));

        let ready = Envelope::new(Call::OnReady {
            handle: handle(1),
            expect_navigation: false,
        });
        message_tx.send(ready.into()).expect("send");
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(message_tx);
        served.await.expect("serve");
        assert!(reply_rx.recv().await.is_none());
    }
}
