use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::config::PacingConfig;

/// Random pause between messages so the provider does not see a burst of requests.
///
/// Not a backoff: the delay does not react to rate-limit errors.
#[derive(Clone, Copy, Debug)]
pub struct Pacer {
    cfg: PacingConfig,
}

impl Pacer {
    pub fn new(cfg: PacingConfig) -> Self {
        Self { cfg }
    }

    /// No delay at all; for tests and dry runs.
    pub fn disabled() -> Self {
        Self::new(PacingConfig {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        })
    }

    /// Uniformly distributed in `[min_delay, max_delay]`.
    pub fn next_delay(&self) -> Duration {
        let min = nanos(self.cfg.min_delay);
        let max = nanos(self.cfg.max_delay);
        if max <= min {
            return self.cfg.min_delay;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(min..=max))
    }

    pub async fn pause(&self) -> Duration {
        let delay = self.next_delay();
        if delay > Duration::ZERO {
            sleep(delay).await;
        }
        delay
    }
}

/// Saturates past ~584 years.
fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
