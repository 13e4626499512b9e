//! Condition-based readiness waits.
//!
//! Wait for a predicate to hold, polling at a fixed interval, or fail with
//! [`ForgeError::Timeout`] once the deadline passes.

use std::future::Future;
use std::time::Duration;

use boxforge_shared::errors::{ForgeError, ForgeResult};
use tokio::time::Instant;

/// How long to wait for a condition and how often to check it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Probe exactly once, never sleep.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

/// Poll `probe` until it returns `true` or `policy.timeout` elapses.
///
/// The probe always runs at least once. Errors from the probe abort the wait.
pub async fn wait_until<F, Fut>(policy: WaitPolicy, what: &str, mut probe: F) -> ForgeResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ForgeResult<bool>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if probe().await? {
            tracing::debug!(what, attempts, elapsed = ?start.elapsed(), "Ready");
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            tracing::warn!(what, attempts, "Gave up waiting after {:?}", elapsed);
            return Err(ForgeError::timeout(what, policy.timeout));
        }

        let remaining = policy.timeout - elapsed;
        tokio::time::sleep(policy.interval.min(remaining)).await;
    }
}
