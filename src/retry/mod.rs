//! Retry-until-success for arbitrary async operations.
//!
//! [`RetryExecutor::retry`] runs the operation until it succeeds, the retry
//! count or timeout is exhausted, or the `break_if` predicate rejects the
//! failure. On exhaustion the operation's own error is returned unchanged.

mod strategy;

pub use strategy::RetryStrategy;

use crate::dispatcher::Logger;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

type BreakIf<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

pub struct RetryParams<F, E> {
    method: F,
    retries: Option<u32>,
    timeout: Option<Duration>,
    delay: Duration,
    strategy: RetryStrategy,
    max_delay: Option<Duration>,
    jitter: bool,
    break_if: Option<BreakIf<E>>,
    name: Option<String>,
}

impl<F, E> RetryParams<F, E> {
    /// Unlimited retries, no timeout, no delay.
    pub fn new(method: F) -> Self {
        Self {
            method,
            retries: None,
            timeout: None,
            delay: Duration::ZERO,
            strategy: RetryStrategy::FixedDelay,
            max_delay: None,
            jitter: false,
            break_if: None,
            name: None,
        }
    }

    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Upper bound for growing delays. Ignored by `FixedDelay`.
    #[must_use]
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Scales each delay by a random factor in `0.5..1.5`.
    #[must_use]
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Stops retrying as soon as the predicate returns true for a failure.
    #[must_use]
    pub fn break_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.break_if = Some(Box::new(predicate));
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn should_stop(&self, attempt: u32, elapsed: Duration, error: &E) -> bool {
        self.retries.is_some_and(|retries| attempt > retries)
            || self.timeout.is_some_and(|timeout| elapsed > timeout)
            || self.break_if.as_ref().is_some_and(|predicate| predicate(error))
    }

    fn wait_before(&self, retry_index: u32) -> Duration {
        self.strategy
            .calculate_delay(self.delay, retry_index, self.max_delay, self.jitter)
    }
}

#[derive(Clone)]
pub struct RetryExecutor {
    logger: Logger,
}

impl RetryExecutor {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub async fn retry<F, Fut, T, E>(&self, mut params: RetryParams<F, E>) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let prefix = format!("[Retry] {}:", params.name.as_deref().unwrap_or("retry()"));
        let retries_label = params
            .retries
            .map_or_else(|| "∞".to_string(), |retries| retries.to_string());
        let timeout_label = params
            .timeout
            .map_or_else(|| "∞".to_string(), |timeout| timeout.as_secs_f64().to_string());

        self.logger.debug(
            format!("{prefix} running with {retries_label} retries and {timeout_label}s timeout..."),
            &[],
        );

        let start = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            let error = match (params.method)().await {
                Ok(value) => {
                    self.logger.debug(format!("{prefix} finished successfully!"), &[]);
                    return Ok(value);
                }
                Err(error) => error,
            };

            let elapsed = start.elapsed();
            if params.should_stop(attempt, elapsed, &error) {
                return Err(error);
            }

            let wait = params.wait_before(attempt - 1);
            attempt = attempt.saturating_add(1);

            self.logger.debug(
                format!(
                    "{prefix} {error} | Retry #{attempt}/{retries_label}, elapsed {:.3}/{timeout_label}s...",
                    elapsed.as_secs_f64()
                ),
                &[],
            );

            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use crate::transport::MemoryTransport;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor() -> (RetryExecutor, Arc<MemoryTransport>) {
        let logger = Logger::builder().build();
        let memory = Arc::new(MemoryTransport::new(Some(Severity::Debug)));
        logger.register_transport(memory.clone());
        (RetryExecutor::new(logger), memory)
    }

    #[tokio::test]
    async fn test_logs_start_retry_and_success() {
        let (executor, memory) = executor();
        let calls = AtomicU32::new(0);

        let result: Result<&str, String> = executor
            .retry(
                RetryParams::new(|| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { if n == 0 { Err("flaky".to_string()) } else { Ok("done") } }
                })
                .retries(2)
                .name("fetch"),
            )
            .await;

        assert_eq!(result, Ok("done"));
        let messages = memory.messages();
        assert_eq!(messages[0], "[Retry] fetch: running with 2 retries and ∞s timeout...");
        assert!(messages[1].starts_with("[Retry] fetch: flaky | Retry #2/2, elapsed "));
        assert_eq!(messages[2], "[Retry] fetch: finished successfully!");
        assert!(memory.records().iter().all(|r| r.level == Severity::Debug));
    }

    #[tokio::test]
    async fn test_break_if_stops_immediately() {
        let (executor, _memory) = executor();
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = executor
            .retry(
                RetryParams::new(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal: bad credentials".to_string()) }
                })
                .break_if(|e: &String| e.starts_with("fatal")),
            )
            .await;

        assert_eq!(result, Err("fatal: bad credentials".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let (executor, _memory) = executor();
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = executor
            .retry(
                RetryParams::new(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("nope") }
                })
                .retries(0),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
