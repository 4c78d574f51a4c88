//! Wait policy between run status checks.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// How long to wait between status checks and when to give up.
///
/// Fixed interval by default. With a `multiplier` above 1.0 the interval grows
/// geometrically up to `max_interval`. `max_wait` bounds the total time spent
/// waiting on one run; `None` leaves the bound to the caller's deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_INTERVAL)
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            multiplier: 1.0,
            max_interval: interval,
            max_wait: None,
        }
    }

    pub fn exponential(initial: Duration, multiplier: f64, max_interval: Duration) -> Self {
        Self {
            interval: initial,
            multiplier: multiplier.max(1.0),
            max_interval: max_interval.max(initial),
            max_wait: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Delay before status check number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.multiplier <= 1.0 {
            return self.interval;
        }
        let factor = self.multiplier.powi(attempt.min(32) as i32);
        let delay = self.interval.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_interval.as_secs_f64()))
    }
}

/// Why a poll loop stopped without a terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStop {
    Cancelled,
    MaxWait(Duration),
}

/// Non-busy waiter for one run's poll loop.
pub struct Poller<'a> {
    policy: &'a PollPolicy,
    cancel: &'a CancellationToken,
    started: Instant,
    attempt: u32,
}

impl<'a> Poller<'a> {
    pub fn new(policy: &'a PollPolicy, cancel: &'a CancellationToken) -> Self {
        Self {
            policy,
            cancel,
            started: Instant::now(),
            attempt: 0,
        }
    }

    /// Number of waits completed so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Sleep until the next status check is due.
    ///
    /// The last wait is shortened so the total never exceeds `max_wait`.
    pub async fn wait(&mut self) -> Result<(), PollStop> {
        if self.cancel.is_cancelled() {
            return Err(PollStop::Cancelled);
        }

        let mut delay = self.policy.delay_for(self.attempt);
        if let Some(max_wait) = self.policy.max_wait {
            let waited = self.started.elapsed();
            if waited >= max_wait {
                return Err(PollStop::MaxWait(waited));
            }
            delay = delay.min(max_wait - waited);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PollStop::Cancelled),
            _ = tokio::time::sleep(delay) => {
                self.attempt += 1;
                Ok(())
            }
        }
    }
}
