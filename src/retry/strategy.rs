use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryStrategy {
    ExponentialBackoff,
    LinearBackoff,
    #[default]
    FixedDelay,
}

impl RetryStrategy {
    /// Delay before retry number `retry_index` (0 for the first retry).
    pub fn calculate_delay(
        self,
        base: Duration,
        retry_index: u32,
        max_delay: Option<Duration>,
        jitter: bool,
    ) -> Duration {
        let base_millis = base.as_millis() as u64;
        let delay = match self {
            RetryStrategy::ExponentialBackoff => {
                let multiplier = 2_u64.checked_pow(retry_index).unwrap_or(u64::MAX);
                Duration::from_millis(base_millis.saturating_mul(multiplier))
            }
            RetryStrategy::LinearBackoff => {
                Duration::from_millis(base_millis.saturating_mul(u64::from(retry_index) + 1))
            }
            RetryStrategy::FixedDelay => base,
        };

        let capped = match (self, max_delay) {
            (RetryStrategy::FixedDelay, _) | (_, None) => delay,
            (_, Some(max)) => delay.min(max),
        };

        if jitter { apply_jitter(capped) } else { capped }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let factor = rng.random_range(0.5..1.5); // ±50% jitter
    Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
}
