use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the next attempt, `failed_attempt` being 1-indexed.
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }
        let shift = failed_attempt.saturating_sub(1).min(16);
        let multiplier = 1u32 << shift;
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
    }
}

pub async fn run_with_retry<T, E, F, Fut, C>(
    label: &str,
    retry_policy: RetryPolicy,
    is_retryable: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = retry_policy.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !is_retryable(&err) {
                    return Err(err);
                }

                let delay = retry_policy.backoff_delay(attempt);
                tracing::warn!(
                    "{label}: attempt {attempt} failed, retrying in {}ms: {err}",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn backoff_doubles_per_failed_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));

        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn zero_base_delay_never_sleeps() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert_eq!(policy.backoff_delay(4), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failures_use_full_budget_with_exponential_delays() {
        let started = Instant::now();
        let attempts = Mutex::new(Vec::new());

        let result: Result<(), String> = run_with_retry(
            "test",
            RetryPolicy::new(3, Duration::from_secs(1)),
            |_| true,
            || {
                let n = {
                    let mut seen = attempts.lock().expect("attempt log");
                    seen.push(started.elapsed());
                    seen.len()
                };
                async move { Err(format!("failure {n}")) }
            },
        )
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        let seen = attempts.lock().expect("attempt log").clone();
        assert_eq!(
            seen,
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(3)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_failure_returns_after_one_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = run_with_retry(
            "test",
            RetryPolicy::new(3, Duration::from_secs(1)),
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
        )
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_transient_failure() {
        let calls = AtomicU32::new(0);

        let result = run_with_retry(
            "test",
            RetryPolicy::new(3, Duration::from_millis(10)),
            |_: &String| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempt_budget_still_runs_once() {
        let calls = AtomicU32::new(0);

        let _: Result<(), &str> = run_with_retry(
            "test",
            RetryPolicy::new(0, Duration::from_millis(10)),
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
