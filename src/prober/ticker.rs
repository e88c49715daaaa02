use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Recurring timer driving a prober: first tick after a start offset, then
/// one tick per period. A tick that is late (because the previous probe ran
/// long) shifts the schedule instead of firing a burst.
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    pub fn new(period: Duration, start_offset: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + start_offset, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Wait for the next tick. Returns `false` once `cancel` has fired.
    pub async fn tick(&mut self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.interval.tick() => true,
        }
    }
}

/// Deterministic start offset in `[0, jitter)` for the target called `name`,
/// so targets configured together do not all fire at the same instant.
pub fn start_offset(name: &str, jitter: Duration) -> Duration {
    let millis = jitter.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    Duration::from_millis(hasher.finish() % millis)
}
