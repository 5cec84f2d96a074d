use std::time::Duration;

use async_trait::async_trait;
use candid::Principal;
use ic_rep_hash::RequestId;

use crate::poll::RequestStatus;
use crate::transport::BoxError;

/// Decides how long to wait between request-status polls.
///
/// [`poll_for_response`](crate::poll_for_response) calls `wait` after every
/// non-terminal status. Returning an error terminates the poll with that
/// error, which is how callers bound a poll in time: compose a strategy
/// that errors once its deadline passes.
#[async_trait]
pub trait PollStrategy: Send {
    /// Waits before the next poll of `request_id` on `canister_id`, which
    /// last reported `status`.
    async fn wait(
        &mut self,
        canister_id: Principal,
        request_id: &RequestId,
        status: &RequestStatus,
    ) -> Result<(), BoxError>;
}

/// Returned by [`ExponentialBackoff`] once its attempt cap is exhausted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("gave up waiting for a terminal request status after {max_attempts} polls")]
pub struct RetryLimitExceeded {
    /// The attempt cap that was hit.
    pub max_attempts: u32,
}

/// The default poll pacing: exponential back-off with a ceiling and an
/// attempt cap.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    next_delay: Duration,
    max_delay: Duration,
    attempts: u32,
    max_attempts: u32,
}

impl ExponentialBackoff {
    /// A back-off starting at `initial`, doubling up to `max_delay`, and
    /// giving up after `max_attempts` waits.
    pub fn new(initial: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            next_delay: initial,
            max_delay,
            attempts: 0,
            max_attempts,
        }
    }
}

impl Default for ExponentialBackoff {
    /// 500 ms doubling to a 5 s ceiling, at most 100 polls.
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(5), 100)
    }
}

#[async_trait]
impl PollStrategy for ExponentialBackoff {
    async fn wait(
        &mut self,
        _canister_id: Principal,
        request_id: &RequestId,
        status: &RequestStatus,
    ) -> Result<(), BoxError> {
        self.attempts += 1;
        if self.attempts > self.max_attempts {
            return Err(Box::new(RetryLimitExceeded {
                max_attempts: self.max_attempts,
            }));
        }
        tracing::debug!(
            %request_id,
            %status,
            delay_ms = self.next_delay.as_millis() as u64,
            "request not terminal yet, backing off"
        );
        tokio::time::sleep(self.next_delay).await;
        self.next_delay = (self.next_delay * 2).min(self.max_delay);
        Ok(())
    }
}
