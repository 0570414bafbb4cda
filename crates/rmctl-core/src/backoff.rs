//! Delay computation between status polls

use std::time::Duration;

use crate::config::PollingConfig;

/// Exponential backoff bounded by a floor and a ceiling
///
/// Server suggestions bypass the exponential sequence: they are floored but
/// never capped, and they do not advance it.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            floor: config.min_delay(),
            ceiling: config.max_delay(),
            multiplier: config.multiplier(),
            current: config.initial_delay().min(config.max_delay()),
        }
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// Apply the floor to an arbitrary delay
    pub fn floored(&self, delay: Duration) -> Duration {
        delay.max(self.floor)
    }

    /// Delay before the next poll
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(suggested) => self.floored(suggested),
            None => {
                let delay = self.current;
                self.current = self
                    .current
                    .mul_f64(self.multiplier)
                    .min(self.ceiling)
                    .max(self.floor);
                delay
            }
        }
    }
}
