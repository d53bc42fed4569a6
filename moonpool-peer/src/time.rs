//! Time provider abstraction.
//!
//! Every delay in the crate (heartbeat cadence, partition detection, RPC
//! receive timeout) goes through [`TimeProvider`], so a test can swap in a
//! paused or simulated clock without touching peer logic.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a bounded wait that ran out of time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The deadline passed first.
    #[error("deadline elapsed")]
    Elapsed,
}

/// Clock used by the scheduler and by RPC waits.
#[async_trait(?Send)]
pub trait TimeProvider: Clone + 'static {
    /// Suspend the current task for `duration`.
    async fn sleep(&self, duration: Duration);

    /// Elapsed time since the provider was created.
    fn now(&self) -> Duration;

    /// Drive `future` for at most `duration`; `Err(TimeError::Elapsed)` if
    /// the deadline passes first.
    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, TimeError>
    where
        F: Future<Output = T>;
}

/// Clock backed by the Tokio timer wheel.
///
/// Uses `tokio::time::Instant` so that `now()` follows the runtime clock,
/// including when it is paused with `tokio::time::pause`.
#[derive(Debug, Clone)]
pub struct TokioTimeProvider {
    start_time: tokio::time::Instant,
}

impl TokioTimeProvider {
    /// Start a clock at the runtime's current instant.
    pub fn new() -> Self {
        Self {
            start_time: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl TimeProvider for TokioTimeProvider {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Duration {
        self.start_time.elapsed()
    }

    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, TimeError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(duration, future)
            .await
            .map_err(|_| TimeError::Elapsed)
    }
}
