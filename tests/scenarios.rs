//! End-to-end scenarios through the full boundary.
//!
//! Every test wires a [`BridgeClient`] to a real [`Registry`] thread through
//! a [`Connection`] and [`Dispatcher`], backed by the deterministic
//! [`SimulatedEngine`]. Set `RUST_LOG=headless_webview=trace` to watch the
//! registry and poller work.

use std::collections::HashSet;
use std::sync::{Arc, Once};
use std::time::Duration;

use headless_webview::{
    BridgeClient, Call, CallBoundary, ClientState, Connection, ConnectionOptions, Error,
    ErrorKind, Handle, HandleAllocation, Registry, SimulatedEngine,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const FAST_POLL: Duration = Duration::from_millis(2);

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

fn registry(engine: SimulatedEngine) -> Registry {
    init_logging();
    Registry::builder()
        .engine(engine)
        .poll_interval(FAST_POLL)
        .spawn()
        .expect("spawn registry")
}

fn handle(id: u32) -> Handle {
    Handle::new(id).expect("non-zero handle")
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_evaluate_read_close() -> anyhow::Result<()> {
    let engine = SimulatedEngine::new()
        .with_load_samples(3)
        .respond("return 1+1", json!(2));
    let registry = registry(engine);
    let client = BridgeClient::connect(&registry);

    let opened = client.init("https://example.com").await?;
    assert_eq!(opened.as_u32(), 1);

    let sum: i64 = client.evaluate("return 1+1").await?;
    assert_eq!(sum, 2);

    let url = client.get_url().await?;
    assert_eq!(url.as_deref(), Some("https://example.com/"));

    client.close();
    let err = client.get_url().await.unwrap_err();
    assert!(matches!(err, Error::Closed));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(registry.handles().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_url_leaves_registry_empty() -> anyhow::Result<()> {
    let registry = registry(SimulatedEngine::new());
    let client = BridgeClient::connect(&registry);

    let err = client.init("not a url").await.unwrap_err();
    assert!(matches!(err, Error::InvalidUrl { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    assert_eq!(client.state(), ClientState::Uninitialized);
    assert_eq!(registry.entry_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn sequential_opens_are_independent() -> anyhow::Result<()> {
    let engine = SimulatedEngine::new()
        .respond("return document.title", json!("Example Domain"));
    let registry = registry(engine);

    let first = BridgeClient::connect(&registry);
    let second = BridgeClient::connect(&registry);
    assert_eq!(first.init("https://example.com").await?.as_u32(), 1);
    assert_eq!(second.init("https://example.org/path").await?.as_u32(), 2);

    let title: String = first.evaluate("return document.title").await?;
    assert_eq!(title, "Example Domain");
    assert_eq!(
        second.get_url().await?.as_deref(),
        Some("https://example.org/path")
    );

    first.close();
    assert_eq!(
        second.get_url().await?.as_deref(),
        Some("https://example.org/path")
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Boundary contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_handles_fail_every_handle_call() -> anyhow::Result<()> {
    let registry = registry(SimulatedEngine::new());
    let connection = Connection::to_registry(registry.clone(), ConnectionOptions::default());

    // One handle never issued, one issued and then closed.
    connection
        .invoke(Call::Open {
            url: "https://example.com".to_string(),
        })
        .await?;
    connection.invoke(Call::Close { handle: handle(1) }).await?;

    for ghost in [handle(1), handle(77)] {
        let calls = [
            Call::Evaluate {
                handle: ghost,
                script: "JSON.stringify((() => { return 1 }) () ?? null);".to_string(),
            },
            Call::GetUrl { handle: ghost },
            Call::Close { handle: ghost },
            Call::OnReady {
                handle: ghost,
                expect_navigation: false,
            },
        ];
        for call in calls {
            let method = call.method();
            let err = connection.invoke(call).await.unwrap_err();
            assert!(err.is_handle_error(), "{method} on {ghost}: {err}");
            assert_eq!(err.boundary_message(), "Invalid WebView ID");
        }
    }
    Ok(())
}

#[tokio::test]
async fn ready_callbacks_fire_in_registration_order() -> anyhow::Result<()> {
    let registry = registry(SimulatedEngine::new().with_load_samples(8));
    let client = BridgeClient::connect(&registry);
    client.init("https://example.com").await?;

    let fired = Arc::new(Mutex::new(Vec::new()));
    for n in 0..10 {
        let fired = Arc::clone(&fired);
        client.on_ready(move || fired.lock().push(n))?;
    }
    assert!(!client.is_ready());

    client.wait_for_ready().await?;
    assert_eq!(*fired.lock(), (0..10).collect::<Vec<_>>());

    let late = Arc::clone(&fired);
    client.on_ready(move || late.lock().push(10))?;
    assert_eq!(fired.lock().len(), 11);
    Ok(())
}

#[tokio::test]
async fn every_operation_fails_after_close() -> anyhow::Result<()> {
    let registry = registry(SimulatedEngine::new());
    let client = BridgeClient::connect(&registry);
    let opened = client.init("https://example.com").await?;
    client.wait_for_ready().await?;

    client.close();

    assert!(matches!(client.init("https://example.com").await, Err(Error::Closed)));
    assert!(matches!(client.on_ready(|| {}), Err(Error::Closed)));
    assert!(matches!(client.wait_for_ready().await, Err(Error::Closed)));
    assert!(matches!(client.evaluate_value("return 1").await, Err(Error::Closed)));
    assert!(matches!(client.get_url().await, Err(Error::Closed)));
    assert!(matches!(client.wait_for_navigation().await, Err(Error::Closed)));
    client.close();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!registry.handles().await?.contains(&opened));
    Ok(())
}

#[tokio::test]
async fn compatibility_allocation_reproduces_collision() -> anyhow::Result<()> {
    init_logging();
    let registry = Registry::builder()
        .engine(SimulatedEngine::new())
        .poll_interval(FAST_POLL)
        .handle_allocation(HandleAllocation::LiveCountPlusOne)
        .spawn()?;

    let a = registry.open("https://a.example").await?;
    let b = registry.open("https://b.example").await?;
    registry.close(a).await?;
    let c = registry.open("https://c.example").await?;

    assert_eq!(c, b);
    assert_eq!(registry.get_url(c).await?.as_deref(), Some("https://c.example/"));
    Ok(())
}

#[tokio::test]
async fn registry_shutdown_surfaces_as_unavailable() -> anyhow::Result<()> {
    let registry = registry(SimulatedEngine::new());
    let client = BridgeClient::connect(&registry);

    registry.shutdown();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = client.init("https://example.com").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    Ok(())
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Strings without a scheme separator never parse as absolute URLs.
    #[test]
    fn malformed_urls_are_rejected(url in "[a-zA-Z0-9 ./_-]{0,40}") {
        let registry = registry(SimulatedEngine::new());

        let (err, count) = tokio_test::block_on(async {
            let err = registry.open(&url).await.unwrap_err();
            (err, registry.entry_count().await.expect("count"))
        });

        let is_invalid_url = matches!(err, Error::InvalidUrl { .. });
        prop_assert!(is_invalid_url);
        prop_assert_eq!(count, 0);
    }

    /// Opened handles never collide with a live handle, however opens and
    /// closes interleave.
    #[test]
    fn opened_handles_are_fresh(ops in prop::collection::vec(any::<bool>(), 1..24)) {
        let registry = registry(SimulatedEngine::new());

        let issued = tokio_test::block_on(async {
            let mut live: Vec<Handle> = Vec::new();
            let mut issued = HashSet::new();

            for open in ops {
                if open || live.is_empty() {
                    let fresh = registry.open("https://example.com").await.expect("open");
                    assert!(!live.contains(&fresh), "{fresh} is already live");
                    assert!(issued.insert(fresh), "{fresh} was issued before");
                    live.push(fresh);
                } else {
                    let victim = live.remove(0);
                    registry.close(victim).await.expect("close");
                }
            }
            issued
        });

        prop_assert!(!issued.is_empty());
    }
}
