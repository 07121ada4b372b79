use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Finite retry budget for outbound calls, exponential backoff with jitter
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first one, values below 1 behave as 1
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn no_retry() -> Self {
        Self::with_max_attempts(1)
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the attempt budget of `policy` is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) if !is_retryable(&err) => {
                log::debug!("{operation_name} failed with non retryable error at attempt {attempt} - {err}");
                return Err(err);
            }
            Err(err) if attempt >= max_attempts => {
                log::warn!("{operation_name} failed after {attempt} attempts - {err}");
                return Err(err);
            }
            Err(err) => {
                // 0.5x to 1.5x of the nominal delay
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                log::warn!(
                    "{operation_name} failed at attempt {attempt}/{max_attempts}, retrying in {}ms - {err}",
                    jittered_delay.as_millis()
                );

                tokio::time::sleep(jittered_delay).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}
