use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional tries after the first attempt.
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(1_000),
        }
    }
}

/// Runs `op` until it succeeds, fails non-transiently, or the retry budget is
/// spent. The last error is returned as-is; classification stays with the
/// caller.
pub async fn with_retry<T, E, F, Fut, C>(policy: &RetryPolicy, mut op: F, is_transient: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt <= policy.retries && is_transient(&e) => {
                warn!(attempt, retries = policy.retries, error = %e, "transient failure, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
