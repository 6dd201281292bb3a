use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Errors that may succeed on another attempt (timeouts, 429, 5xx).
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// base * attempt_number
    Linear,
    /// base * 2^attempt
    Exponential,
}

/// How many extra attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub backoff: Backoff,
}

impl Policy {
    pub fn linear(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            backoff: Backoff::Linear,
        }
    }

    pub fn exponential(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            backoff: Backoff::Exponential,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear => self.base_backoff * (attempt + 1),
            Backoff::Exponential => self.base_backoff * 2u32.pow(attempt),
        }
    }
}

/// Run `op`, retrying retryable errors up to `policy.max_retries` extra
/// attempts. Terminal errors are returned immediately.
pub async fn run<T, E, F, Fut>(policy: Policy, what: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:.1}s: {}",
                    what,
                    attempt + 1,
                    policy.max_retries + 1,
                    delay.as_secs_f64(),
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct FakeError {
        retryable: bool,
    }

    impl Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake error (retryable: {})", self.retryable)
        }
    }

    impl Retryable for FakeError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn fast_policy(max_retries: u32) -> Policy {
        Policy::exponential(max_retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn two_transient_failures_then_success_takes_three_calls() {
        let calls = Cell::new(0u32);
        let result: Result<&str, FakeError> = run(fast_policy(3), "op", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n <= 2 {
                    Err(FakeError { retryable: true })
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn terminal_error_is_not_retried() {
        let calls = Cell::new(0u32);
        let result: Result<(), FakeError> = run(fast_policy(3), "op", || {
            calls.set(calls.get() + 1);
            async { Err(FakeError { retryable: false }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let calls = Cell::new(0u32);
        let result: Result<(), FakeError> = run(fast_policy(2), "op", || {
            calls.set(calls.get() + 1);
            async { Err(FakeError { retryable: true }) }
        })
        .await;

        assert!(result.is_err());
        // 1 initial try + 2 retries
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn backoff_schedules() {
        let linear = Policy::linear(3, Duration::from_millis(100));
        assert_eq!(linear.delay(0), Duration::from_millis(100));
        assert_eq!(linear.delay(1), Duration::from_millis(200));

        let exp = Policy::exponential(3, Duration::from_millis(100));
        assert_eq!(exp.delay(0), Duration::from_millis(100));
        assert_eq!(exp.delay(1), Duration::from_millis(200));
        assert_eq!(exp.delay(2), Duration::from_millis(400));
    }
}
