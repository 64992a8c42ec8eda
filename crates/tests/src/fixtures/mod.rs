pub mod agent_stub;

use std::sync::Once;
use std::time::Duration;

/// Initializes tracing once for the whole test binary; `RUST_LOG` controls
/// verbosity.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Polls `cond` until it holds, panicking after `timeout_ms`.
pub async fn wait_for(what: &str, timeout_ms: u64, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out after {timeout_ms}ms waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
