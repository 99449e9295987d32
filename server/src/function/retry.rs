//! Retry of function updates that conflict with an in-flight update

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use crate::errors::{ProviderError, PublishError};
use crate::utils::calc_exp_backoff;

/// Injected sleep so tests can observe backoff without waiting
pub type SleepFn = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

pub fn tokio_sleep() -> SleepFn {
    Arc::new(|wait: Duration| -> BoxFuture<'static, ()> { Box::pin(tokio::time::sleep(wait)) })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(initial_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            initial_backoff,
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Run `op`, retrying on [`ProviderError::Conflict`].
///
/// After the n-th conflicting attempt (n from 0) the call sleeps
/// `initial_backoff * 2^n`, except after the last attempt. Any other error
/// is returned immediately.
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &RetryPolicy,
    sleep_fn: &SleepFn,
    operation: &str,
    mut op: F,
) -> Result<T, PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    for attempt in 0..policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(ProviderError::Conflict(message)) => {
                if attempt + 1 == policy.max_attempts {
                    break;
                }
                let wait = calc_exp_backoff(policy.initial_backoff, attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    wait_ms = wait.as_millis() as u64,
                    %message,
                    "update conflict, retrying"
                );
                sleep_fn(wait).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(PublishError::RetriesExhausted {
        attempts: policy.max_attempts,
    })
}
