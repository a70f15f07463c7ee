//! Custom assertion macros and utilities

use std::future::Future;
use std::time::Duration;

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert the number of queued mutations
#[macro_export]
macro_rules! assert_pending {
    ($engine:expr, $expected:expr) => {
        let stats = $engine.get_stats().await.expect("stats");
        assert_eq!(
            stats.pending_sync, $expected,
            "Expected {} pending mutations, found {}",
            $expected, stats.pending_sync
        );
    };
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
