//! Instance registry.
//!
//! Owns the mapping from [`Handle`] to live browsing context. The mapping is
//! confined to one dedicated OS thread running a single-threaded tokio
//! runtime; every context is created, used, and dropped there. [`Registry`]
//! is a cheap, cloneable handle that talks to that thread over a channel.
//!
//! # Event Loop
//!
//! The registry thread runs a loop that handles:
//!
//! - `open` / `close` / lookups, applied one at a time in arrival order
//! - Script evaluation, started in order and completed as local tasks so
//!   a slow script never blocks other handles
//! - Shutdown, which detaches every live context
//!
//! ```text
//! ┌──────────────┐   RegistryCommand    ┌───────────────────────────┐
//! │  Registry    │ ───────────────────► │  webview-registry thread  │
//! │  (any task)  │ ◄─────────────────── │  Handle → BrowsingContext │
//! └──────────────┘   oneshot replies    └───────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::thread;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::runtime::Builder as RuntimeBuilder;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{LocalSet, spawn_local};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::engine::{BrowsingContext, Engine};
use crate::error::{Error, Result};
use crate::identifiers::Handle;

use super::allocator::{HandleAllocation, HandleAllocator};
use super::options::RegistryOptions;

// ============================================================================
// Types
// ============================================================================

/// Reply channel for one registry command.
type Reply<T> = oneshot::Sender<Result<T>>;

// ============================================================================
// RegistryCommand
// ============================================================================

/// Commands processed by the registry thread.
enum RegistryCommand {
    /// Create, attach, and start loading a context.
    Open { url: String, reply: Reply<Handle> },
    /// Run a script against a live context.
    Evaluate {
        handle: Handle,
        script: String,
        reply: Reply<Option<Value>>,
    },
    /// Read a context's current address.
    GetUrl {
        handle: Handle,
        reply: Reply<Option<String>>,
    },
    /// Detach and forget a context.
    Close { handle: Handle, reply: Reply<()> },
    /// Sample a context's loading flag.
    IsLoading { handle: Handle, reply: Reply<bool> },
    /// List live handles.
    Handles { reply: Reply<Vec<Handle>> },
    /// Stop the loop.
    Shutdown,
}

// ============================================================================
// Registry
// ============================================================================

/// Handle to the registry thread.
///
/// Cloning is cheap; all clones address the same registry. The thread stops
/// once [`Registry::shutdown`] is called or every clone has been dropped.
///
/// # Example
///
/// ```ignore
/// let registry = Registry::builder().engine(SimulatedEngine::new()).spawn()?;
///
/// let handle = registry.open("https://example.com").await?;
/// registry.await_ready(handle).await?;
/// let url = registry.get_url(handle).await?;
/// registry.close(handle).await?;
/// ```
#[derive(Clone)]
pub struct Registry {
    /// Channel into the registry thread.
    command_tx: mpsc::UnboundedSender<RegistryCommand>,
    /// Options the registry was spawned with.
    options: Arc<RegistryOptions>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("thread", &self.options.thread_name)
            .field("closed", &self.command_tx.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Registry - Constructor
// ============================================================================

impl Registry {
    /// Spawns the registry thread with the given engine.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options are invalid
    /// - [`Error::Io`] if the runtime or thread cannot be created
    pub(crate) fn spawn(engine: Box<dyn Engine>, options: RegistryOptions) -> Result<Self> {
        options.validate()?;

        let runtime = RuntimeBuilder::new_current_thread().enable_all().build()?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let allocation = options.handle_allocation;

        thread::Builder::new()
            .name(options.thread_name.clone())
            .spawn(move || {
                let local = LocalSet::new();
                local.block_on(&runtime, run_event_loop(engine, allocation, command_rx));
            })?;

        info!(thread = %options.thread_name, ?allocation, "Registry started");

        Ok(Self {
            command_tx,
            options: Arc::new(options),
        })
    }
}

// ============================================================================
// Registry - Public API
// ============================================================================

impl Registry {
    /// Opens a browsing context on `url` and returns its handle.
    ///
    /// Returns as soon as the navigation has started; the page is most
    /// likely still loading.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` is not a well-formed absolute URL
    /// - [`Error::Engine`] if the engine cannot create a context
    /// - [`Error::RegistryClosed`] if the registry has stopped
    pub async fn open(&self, url: &str) -> Result<Handle> {
        self.request(|reply| RegistryCommand::Open {
            url: url.to_string(),
            reply,
        })
        .await
    }

    /// Runs `script` in the context immediately, without waiting for readiness.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownHandle`] if the handle is not live
    /// - [`Error::ScriptError`] if the script raised
    pub async fn evaluate(&self, handle: Handle, script: &str) -> Result<Option<Value>> {
        self.request(|reply| RegistryCommand::Evaluate {
            handle,
            script: script.to_string(),
            reply,
        })
        .await
    }

    /// Returns the context's current address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHandle`] if the handle is not live.
    pub async fn get_url(&self, handle: Handle) -> Result<Option<String>> {
        self.request(|reply| RegistryCommand::GetUrl { handle, reply })
            .await
    }

    /// Detaches the context and forgets the handle.
    ///
    /// A second close of the same handle fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHandle`] if the handle is not live.
    pub async fn close(&self, handle: Handle) -> Result<()> {
        self.request(|reply| RegistryCommand::Close { handle, reply })
            .await
    }

    /// Reports whether the context has a navigation in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHandle`] if the handle is not live.
    pub async fn is_loading(&self, handle: Handle) -> Result<bool> {
        self.request(|reply| RegistryCommand::IsLoading { handle, reply })
            .await
    }

    /// Returns the live handles in ascending order.
    pub async fn handles(&self) -> Result<Vec<Handle>> {
        self.request(|reply| RegistryCommand::Handles { reply })
            .await
    }

    /// Returns the number of live entries.
    pub async fn entry_count(&self) -> Result<usize> {
        Ok(self.handles().await?.len())
    }

    /// Returns the options the registry was spawned with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Returns `true` once the registry thread has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Stops the registry thread, detaching every live context.
    ///
    /// Calls already queued are still answered; later calls fail with
    /// [`Error::RegistryClosed`].
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(RegistryCommand::Shutdown);
    }
}

// ============================================================================
// Registry - Internal
// ============================================================================

impl Registry {
    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RegistryCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .map_err(|_| Error::RegistryClosed)?;

        reply_rx.await.map_err(|_| Error::RegistryClosed)?
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Registry-thread state.
struct RegistryState {
    engine: Box<dyn Engine>,
    allocator: HandleAllocator,
    entries: FxHashMap<Handle, Box<dyn BrowsingContext>>,
}

/// Event loop run on the registry thread.
async fn run_event_loop(
    engine: Box<dyn Engine>,
    allocation: HandleAllocation,
    mut command_rx: mpsc::UnboundedReceiver<RegistryCommand>,
) {
    let mut state = RegistryState {
        engine,
        allocator: HandleAllocator::new(allocation),
        entries: FxHashMap::default(),
    };

    while let Some(command) = command_rx.recv().await {
        match command {
            RegistryCommand::Open { url, reply } => {
                let _ = reply.send(state.open(&url));
            }

            RegistryCommand::Evaluate {
                handle,
                script,
                reply,
            } => state.evaluate(handle, &script, reply),

            RegistryCommand::GetUrl { handle, reply } => {
                let result = state
                    .context(handle)
                    .map(|context| context.url().map(|url| url.to_string()));
                let _ = reply.send(result);
            }

            RegistryCommand::Close { handle, reply } => {
                let _ = reply.send(state.close(handle));
            }

            RegistryCommand::IsLoading { handle, reply } => {
                let result = state.context(handle).map(|context| context.is_loading());
                trace!(%handle, ?result, "Sampled loading state");
                let _ = reply.send(result);
            }

            RegistryCommand::Handles { reply } => {
                let mut handles: Vec<Handle> = state.entries.keys().copied().collect();
                handles.sort_unstable();
                let _ = reply.send(Ok(handles));
            }

            RegistryCommand::Shutdown => {
                debug!("Shutdown command received");
                break;
            }
        }
    }

    state.detach_all();
    debug!("Registry event loop terminated");
}

impl RegistryState {
    /// Looks up a live context.
    fn context(&self, handle: Handle) -> Result<&dyn BrowsingContext> {
        self.entries
            .get(&handle)
            .map(|context| &**context)
            .ok_or_else(|| Error::unknown_handle(handle))
    }

    /// Creates, attaches, and starts loading a new context.
    fn open(&mut self, url: &str) -> Result<Handle> {
        let parsed = Url::parse(url).map_err(|e| {
            debug!(url, error = %e, "Rejected URL");
            Error::invalid_url(url)
        })?;

        let mut context = self.engine.create_context()?;
        context.attach();
        context.load(&parsed);

        let handle = match self.allocator.next(self.entries.len()) {
            Ok(handle) => handle,
            Err(e) => {
                context.detach();
                return Err(e);
            }
        };

        if let Some(mut displaced) = self.entries.insert(handle, context) {
            warn!(%handle, "Handle collision, displacing live context");
            displaced.detach();
        }

        info!(%handle, url = %parsed, live = self.entries.len(), "Context opened");
        Ok(handle)
    }

    /// Starts a script and replies once it completes.
    fn evaluate(&self, handle: Handle, script: &str, reply: Reply<Option<Value>>) {
        let completion = match self.context(handle) {
            Ok(context) => context.evaluate(script),
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        debug!(%handle, script_len = script.len(), "Evaluating script");

        spawn_local(async move {
            let result = completion.await.map_err(|message| {
                debug!(%handle, error = %message, "Script raised");
                Error::script_error(message)
            });
            let _ = reply.send(result);
        });
    }

    /// Detaches and removes a context.
    fn close(&mut self, handle: Handle) -> Result<()> {
        let mut context = self
            .entries
            .remove(&handle)
            .ok_or_else(|| Error::unknown_handle(handle))?;
        context.detach();

        info!(%handle, live = self.entries.len(), "Context closed");
        Ok(())
    }

    /// Detaches every live context.
    fn detach_all(&mut self) {
        let count = self.entries.len();
        for (_, mut context) in self.entries.drain() {
            context.detach();
        }

        if count > 0 {
            debug!(count, "Detached contexts on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::engine::SimulatedEngine;

    fn spawn(engine: SimulatedEngine) -> Registry {
        Registry::spawn(Box::new(engine), RegistryOptions::new()).expect("spawn registry")
    }

    fn spawn_with(engine: SimulatedEngine, options: RegistryOptions) -> Registry {
        Registry::spawn(Box::new(engine), options).expect("spawn registry")
    }

    #[test]
    fn test_registry_is_clone_and_debug() {
        fn assert_clone<T: Clone>() {}
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_clone::<Registry>();
        assert_debug::<Registry>();
    }

    #[tokio::test]
    async fn test_open_attaches_and_starts_loading() {
        let engine = SimulatedEngine::new().with_load_samples(1);
        let registry = spawn(engine.clone());

        let handle = registry.open("https://example.com").await.expect("open");
        assert_eq!(handle.as_u32(), 1);

        let page = engine.page(0).expect("page created");
        assert!(page.is_attached());
        assert_eq!(page.navigations(), 1);
        assert!(registry.is_loading(handle).await.expect("sample"));
        assert!(!registry.is_loading(handle).await.expect("sample"));
    }

    #[tokio::test]
    async fn test_open_rejects_malformed_url() {
        let engine = SimulatedEngine::new();
        let registry = spawn(engine.clone());

        let err = registry.open("not a url").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { ref url } if url == "not a url"));
        assert_eq!(registry.entry_count().await.expect("count"), 0);
        assert!(engine.pages().is_empty());
    }

    #[tokio::test]
    async fn test_get_url_is_normalized() {
        let registry = spawn(SimulatedEngine::new());
        let handle = registry.open("https://example.com").await.expect("open");

        let url = registry.get_url(handle).await.expect("url");
        assert_eq!(url.as_deref(), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn test_evaluate_results_and_errors() {
        let engine = SimulatedEngine::new()
            .respond("document.title", json!("Example Domain"))
            .throw("missing()", "ReferenceError: missing is not defined");
        let registry = spawn(engine);
        let handle = registry.open("https://example.com").await.expect("open");

        let title = registry.evaluate(handle, "document.title").await.expect("evaluate");
        assert_eq!(title, Some(json!("Example Domain")));

        let err = registry.evaluate(handle, "missing()").await.unwrap_err();
        assert!(matches!(err, Error::ScriptError { ref message } if message.contains("missing")));
    }

    #[tokio::test]
    async fn test_close_detaches_and_second_close_fails() {
        let engine = SimulatedEngine::new();
        let registry = spawn(engine.clone());
        let handle = registry.open("https://example.com").await.expect("open");

        registry.close(handle).await.expect("first close");
        assert!(!engine.page(0).expect("page").is_attached());

        let err = registry.close(handle).await.unwrap_err();
        assert!(err.is_handle_error());
    }

    #[tokio::test]
    async fn test_unknown_handle_everywhere() {
        let registry = spawn(SimulatedEngine::new());
        let ghost = Handle::new(42).expect("non-zero");

        assert!(registry.evaluate(ghost, "1").await.unwrap_err().is_handle_error());
        assert!(registry.get_url(ghost).await.unwrap_err().is_handle_error());
        assert!(registry.close(ghost).await.unwrap_err().is_handle_error());
        assert!(registry.is_loading(ghost).await.unwrap_err().is_handle_error());
    }

    #[tokio::test]
    async fn test_monotonic_handles_survive_close_and_reopen() {
        let registry = spawn(SimulatedEngine::new());

        let first = registry.open("https://a.example").await.expect("open");
        let second = registry.open("https://b.example").await.expect("open");
        registry.close(first).await.expect("close");
        let third = registry.open("https://c.example").await.expect("open");

        assert_eq!(
            (first.as_u32(), second.as_u32(), third.as_u32()),
            (1, 2, 3)
        );
        assert_eq!(registry.handles().await.expect("handles"), vec![second, third]);
    }

    #[tokio::test]
    async fn test_live_count_policy_collides_and_displaces() {
        let engine = SimulatedEngine::new();
        let options =
            RegistryOptions::new().with_handle_allocation(HandleAllocation::LiveCountPlusOne);
        let registry = spawn_with(engine.clone(), options);

        let first = registry.open("https://a.example").await.expect("open");
        let second = registry.open("https://b.example").await.expect("open");
        registry.close(first).await.expect("close");
        let third = registry.open("https://c.example").await.expect("open");

        assert_eq!(third, second);
        assert_eq!(registry.entry_count().await.expect("count"), 1);
        // The page behind the old handle 2 was displaced and detached.
        assert!(!engine.page(1).expect("page b").is_attached());
        assert!(engine.page(2).expect("page c").is_attached());
    }

    #[tokio::test]
    async fn test_engine_failure_leaves_registry_unchanged() {
        let registry = spawn(SimulatedEngine::new().fail_creation("no surface"));

        let err = registry.open("https://example.com").await.unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));
        assert_eq!(registry.entry_count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_shutdown_detaches_and_rejects_later_calls() {
        let engine = SimulatedEngine::new();
        let registry = spawn(engine.clone());
        registry.open("https://example.com").await.expect("open");

        registry.shutdown();
        let err = registry.open("https://example.com").await.unwrap_err();
        assert!(matches!(err, Error::RegistryClosed));
        assert!(!engine.page(0).expect("page").is_attached());
        assert!(registry.is_closed());
    }

    #[test]
    fn test_spawn_rejects_invalid_options() {
        let options = RegistryOptions::new().with_poll_interval(std::time::Duration::ZERO);
        let err = Registry::spawn(Box::new(SimulatedEngine::new()), options).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
