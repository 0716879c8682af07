//! Deterministic in-memory browsing engine.
//!
//! Navigation length is counted in `is_loading` samples rather than wall
//! time: a page loading for `n` samples reports `true` to the next `n`
//! samples and `false` afterwards. Script results come from a table keyed by
//! script body, so behaviour is reproducible regardless of poll interval.
//!
//! # Example
//!
//! ```ignore
//! use headless_webview::SimulatedEngine;
//! use serde_json::json;
//!
//! let engine = SimulatedEngine::new()
//!     .with_load_samples(3)
//!     .respond("return 1+1", json!(2))
//!     .throw("throw new Error('boom')", "Error: boom");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::ready;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::script;

use super::{BrowsingContext, Engine, ScriptFuture, ScriptResult};

// ============================================================================
// Constants
// ============================================================================

/// Samples a fresh page reports as loading unless configured otherwise.
const DEFAULT_LOAD_SAMPLES: u32 = 2;

// ============================================================================
// ScriptResponse
// ============================================================================

/// Scripted reaction to one script body.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptResponse {
    /// Script returns this value.
    Value(Value),
    /// Script throws with this message.
    Throw(String),
    /// Script starts a navigation lasting `load_samples` samples.
    Navigate {
        /// Destination address.
        url: Url,
        /// Samples the navigation stays in flight.
        load_samples: u32,
    },
}

// ============================================================================
// Types
// ============================================================================

/// Shared engine configuration.
#[derive(Debug)]
struct EngineConfig {
    load_samples: u32,
    responses: FxHashMap<String, ScriptResponse>,
    creation_failure: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_samples: DEFAULT_LOAD_SAMPLES,
            responses: FxHashMap::default(),
            creation_failure: None,
        }
    }
}

/// Mutable state of one simulated page.
#[derive(Debug, Default)]
struct PageState {
    url: Option<Url>,
    loading_left: u32,
    samples: u32,
    navigations: u32,
    attached: bool,
    scripts: Vec<String>,
}

// ============================================================================
// SimulatedEngine
// ============================================================================

/// In-memory engine whose pages load for a fixed number of samples.
///
/// Clones share configuration and the list of created pages, so a test can
/// keep one clone for inspection while the registry owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    config: Arc<Mutex<EngineConfig>>,
    pages: Arc<Mutex<Vec<SimulatedPage>>>,
}

impl SimulatedEngine {
    /// Creates an engine with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many samples each initial load stays in flight.
    #[must_use]
    pub fn with_load_samples(self, samples: u32) -> Self {
        self.config.lock().load_samples = samples;
        self
    }

    /// Makes `body` return `value`.
    #[must_use]
    pub fn respond(self, body: impl Into<String>, value: Value) -> Self {
        self.script(body, ScriptResponse::Value(value))
    }

    /// Makes `body` throw with `message`.
    #[must_use]
    pub fn throw(self, body: impl Into<String>, message: impl Into<String>) -> Self {
        self.script(body, ScriptResponse::Throw(message.into()))
    }

    /// Makes `body` navigate to `url` for `load_samples` samples.
    #[must_use]
    pub fn navigate_on(self, body: impl Into<String>, url: Url, load_samples: u32) -> Self {
        self.script(body, ScriptResponse::Navigate { url, load_samples })
    }

    /// Registers an arbitrary scripted response.
    #[must_use]
    pub fn script(self, body: impl Into<String>, response: ScriptResponse) -> Self {
        self.config.lock().responses.insert(body.into(), response);
        self
    }

    /// Makes every subsequent context creation fail with `message`.
    #[must_use]
    pub fn fail_creation(self, message: impl Into<String>) -> Self {
        self.config.lock().creation_failure = Some(message.into());
        self
    }

    /// Returns every page created so far, in creation order.
    #[must_use]
    pub fn pages(&self) -> Vec<SimulatedPage> {
        self.pages.lock().clone()
    }

    /// Returns the `index`-th created page.
    #[must_use]
    pub fn page(&self, index: usize) -> Option<SimulatedPage> {
        self.pages.lock().get(index).cloned()
    }
}

impl Engine for SimulatedEngine {
    fn create_context(&mut self) -> Result<Box<dyn BrowsingContext>> {
        if let Some(message) = self.config.lock().creation_failure.clone() {
            return Err(Error::engine(message));
        }

        let page = SimulatedPage {
            state: Arc::new(Mutex::new(PageState::default())),
            config: Arc::clone(&self.config),
        };
        self.pages.lock().push(page.clone());

        Ok(Box::new(page))
    }
}

// ============================================================================
// SimulatedPage
// ============================================================================

/// One simulated browsing context.
///
/// Cloning yields another view of the same page.
#[derive(Debug, Clone)]
pub struct SimulatedPage {
    state: Arc<Mutex<PageState>>,
    config: Arc<Mutex<EngineConfig>>,
}

impl SimulatedPage {
    /// Starts a navigation lasting `load_samples` samples.
    pub fn begin_navigation(&self, url: Url, load_samples: u32) {
        let mut state = self.state.lock();
        state.url = Some(url);
        state.loading_left = load_samples;
        state.navigations += 1;
    }

    /// Returns the current address.
    #[must_use]
    pub fn current_url(&self) -> Option<Url> {
        self.state.lock().url.clone()
    }

    /// Returns how many times `is_loading` has been sampled.
    #[must_use]
    pub fn samples(&self) -> u32 {
        self.state.lock().samples
    }

    /// Returns how many navigations have started.
    #[must_use]
    pub fn navigations(&self) -> u32 {
        self.state.lock().navigations
    }

    /// Returns `true` while attached to the host surface.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    /// Returns every script evaluated so far, as received.
    #[must_use]
    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().scripts.clone()
    }

    fn run(&self, source: &str) -> ScriptResult {
        self.state.lock().scripts.push(source.to_string());

        let wrapped = script::unwrap(source);
        let key = wrapped.unwrap_or(source);
        let response = self.config.lock().responses.get(key).cloned();

        let value = match response {
            Some(ScriptResponse::Value(value)) => Some(value),
            Some(ScriptResponse::Throw(message)) => return Err(message),
            Some(ScriptResponse::Navigate { url, load_samples }) => {
                self.begin_navigation(url, load_samples);
                None
            }
            None => None,
        };

        // A wrapped script yields JSON text, `null` included.
        if wrapped.is_some() {
            let json = value.unwrap_or(Value::Null).to_string();
            return Ok(Some(Value::String(json)));
        }
        Ok(value)
    }
}

impl BrowsingContext for SimulatedPage {
    fn attach(&mut self) {
        self.state.lock().attached = true;
    }

    fn load(&mut self, url: &Url) {
        let samples = self.config.lock().load_samples;
        self.begin_navigation(url.clone(), samples);
    }

    fn is_loading(&self) -> bool {
        let mut state = self.state.lock();
        state.samples += 1;
        let loading = state.loading_left > 0;
        if loading {
            state.loading_left -= 1;
        }
        trace!(sample = state.samples, loading, "Simulated page sampled");
        loading
    }

    fn url(&self) -> Option<Url> {
        self.current_url()
    }

    fn evaluate(&self, script: &str) -> ScriptFuture {
        ready(self.run(script)).boxed_local()
    }

    fn detach(&mut self) {
        self.state.lock().attached = false;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid url")
    }

    fn new_page(engine: &mut SimulatedEngine) -> Box<dyn BrowsingContext> {
        engine.create_context().expect("create context")
    }

    #[test]
    fn test_load_counts_down_samples() {
        let mut engine = SimulatedEngine::new().with_load_samples(3);
        let mut page = new_page(&mut engine);
        page.load(&url("https://example.com"));

        let observed: Vec<bool> = (0..5).map(|_| page.is_loading()).collect();
        assert_eq!(observed, vec![true, true, true, false, false]);
        assert_eq!(engine.page(0).map(|p| p.samples()), Some(5));
    }

    #[test]
    fn test_attach_and_detach_are_tracked() {
        let mut engine = SimulatedEngine::new();
        let mut page = new_page(&mut engine);
        let view = engine.page(0).expect("page recorded");

        assert!(!view.is_attached());
        page.attach();
        assert!(view.is_attached());
        page.detach();
        assert!(!view.is_attached());
    }

    #[test]
    fn test_wrapped_scripts_yield_json_text() {
        let mut engine = SimulatedEngine::new().respond("return 1+1", json!(2));
        let page = new_page(&mut engine);

        let result = page.evaluate(&script::wrap("return 1+1")).now_or_never();
        assert_eq!(result, Some(Ok(Some(json!("2")))));

        let missing = page.evaluate(&script::wrap("return undefined")).now_or_never();
        assert_eq!(missing, Some(Ok(Some(json!("null")))));
    }

    #[test]
    fn test_raw_scripts_yield_plain_values() {
        let mut engine = SimulatedEngine::new().respond("document.title", json!("Example"));
        let page = new_page(&mut engine);

        let result = page.evaluate("document.title").now_or_never();
        assert_eq!(result, Some(Ok(Some(json!("Example")))));
        assert_eq!(page.evaluate("unknown()").now_or_never(), Some(Ok(None)));
    }

    #[test]
    fn test_throw_and_navigate_responses() {
        let next = url("https://example.com/next");
        let mut engine = SimulatedEngine::new()
            .throw("boom()", "ReferenceError: boom is not defined")
            .navigate_on("go()", next.clone(), 4);
        let page = new_page(&mut engine);

        let thrown = page.evaluate("boom()").now_or_never();
        assert_eq!(
            thrown,
            Some(Err("ReferenceError: boom is not defined".to_string()))
        );

        let _ = page.evaluate("go()").now_or_never();
        assert_eq!(page.url(), Some(next));
        assert!(page.is_loading());

        let view = engine.page(0).expect("page recorded");
        assert_eq!(view.navigations(), 1);
        assert_eq!(view.scripts(), vec!["boom()".to_string(), "go()".to_string()]);
    }

    #[test]
    fn test_creation_failure() {
        let mut engine = SimulatedEngine::new().fail_creation("no surface");
        let err = engine.create_context().err().expect("creation fails");
        assert!(matches!(err, Error::Engine { .. }));
        assert!(engine.pages().is_empty());
    }
}
