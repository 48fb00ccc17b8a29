pub mod fake_backend;
pub mod messages;
pub mod recording;

use std::sync::Once;
use std::time::Duration;

use buildpipe::engine::RunNotice;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

pub use fake_backend::{FakeBackend, SpawnBehaviour};
pub use recording::{RecordingNotifier, RecordingOutput, RecordingStatus, TestHost};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `condition` every few milliseconds until it holds (5-second cap).
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    with_timeout(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

/// Next notice, skipping nothing.
pub async fn next_notice(rx: &mut broadcast::Receiver<RunNotice>) -> RunNotice {
    with_timeout(rx.recv()).await.expect("notice channel closed")
}

/// Skip notices until a `Finished` or `Rejected` arrives.
pub async fn next_end_notice(rx: &mut broadcast::Receiver<RunNotice>) -> RunNotice {
    loop {
        match next_notice(rx).await {
            RunNotice::Started { .. } => continue,
            other => return other,
        }
    }
}
