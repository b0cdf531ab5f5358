use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::MqError;

/// Two-phase connection lifecycle shared by producers and consumers.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable lowercase identifier used in log lines (e.g. `"redis-producer"`).
    fn name(&self) -> &str;

    /// Make a single handshake attempt with the broker.
    async fn connect(&mut self) -> Result<(), MqError>;

    /// Retry [`connect`](Connector::connect) up to `max_attempts` times.
    ///
    /// After failed attempt `n` (unless it was the last) the client sleeps
    /// `backoff * n`, saturating at `Duration::MAX`. A cancellation during that sleep returns
    /// [`MqError::Cancelled`] immediately. Running out of attempts returns
    /// [`MqError::ConnectFailed`]. `max_attempts == 0` is treated as 1.
    async fn wait_for_connect(
        &mut self,
        max_attempts: u32,
        backoff: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), MqError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.connect().await {
                Ok(()) => {
                    info!(connector = %self.name(), attempt, "broker connected");
                    return Ok(());
                }
                Err(e) => e,
            };

            if attempt >= max_attempts {
                return Err(MqError::ConnectFailed {
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }

            let delay = backoff.saturating_mul(attempt);
            warn!(
                connector = %self.name(),
                attempt,
                max = max_attempts,
                error = %err,
                retry_after_ms = delay.as_millis() as u64,
                "broker connect failed, retrying with backoff"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MqError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    /// Fails the first `fail_first` attempts, then succeeds.
    struct Flaky {
        fail_first: u32,
        attempts: u32,
    }

    impl Flaky {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                attempts: 0,
            }
        }
    }

    #[async_trait]
    impl Connector for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn connect(&mut self) -> Result<(), MqError> {
            self.attempts += 1;
            if self.attempts <= self.fail_first {
                Err(MqError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_two_sleeps() {
        let backoff = Duration::from_millis(100);
        let mut flaky = Flaky::new(2);
        let started = Instant::now();

        flaky
            .wait_for_connect(3, backoff, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(flaky.attempts, 3);
        // Linear backoff: 1 * b + 2 * b.
        assert_eq!(started.elapsed(), backoff * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let mut flaky = Flaky::new(u32::MAX);

        let err = flaky
            .wait_for_connect(3, Duration::from_millis(100), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MqError::ConnectFailed { attempts: 3, .. }));
        assert_eq!(flaky.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_does_not_sleep() {
        let mut flaky = Flaky::new(0);
        let started = Instant::now();

        flaky
            .wait_for_connect(5, Duration::from_secs(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(flaky.attempts, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_retrying() {
        let mut flaky = Flaky::new(u32::MAX);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            canceller.cancel();
        });

        // Attempt 1 fails, sleeps 100ms; attempt 2 fails, cancelled during the 200ms sleep.
        let err = flaky
            .wait_for_connect(10, Duration::from_millis(100), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, MqError::Cancelled));
        assert_eq!(flaky.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_backoff_saturates_instead_of_overflowing() {
        let mut flaky = Flaky::new(u32::MAX);
        // backoff * 2 does not fit in a Duration.
        let backoff = Duration::MAX / 2 + Duration::from_secs(1);

        let err = flaky
            .wait_for_connect(3, backoff, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MqError::ConnectFailed { attempts: 3, .. }));
        assert_eq!(flaky.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let mut flaky = Flaky::new(u32::MAX);

        let err = flaky
            .wait_for_connect(0, Duration::from_millis(10), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MqError::ConnectFailed { attempts: 1, .. }));
        assert_eq!(flaky.attempts, 1);
    }
}
