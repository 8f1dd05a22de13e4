// crates/test-utils/src/lib.rs

//! Shared helpers for pipedag tests: tracing setup, timeouts, a fake
//! executor backend, and a small genomics-style rule set used across
//! the integration tests.

pub mod fake_backend;
pub mod rules;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

pub use fake_backend::FakeBackend;

static INIT: Once = Once::new();

/// Initialise tracing for tests. Safe to call from every test; only
/// the first call installs the subscriber.
///
/// Respects `RUST_LOG`, defaulting to `debug` for the crates under
/// test.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pipedag=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Default timeout for awaiting async conditions in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `fut`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F>(fut: F) -> F::Output
where
    F: Future,
{
    tokio::time::timeout(TEST_TIMEOUT, fut)
        .await
        .expect("test future timed out")
}
