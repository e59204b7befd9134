use core::time::Duration;

use embassy_time::{Instant, block_for};
use sampler_core::hal::MonotonicClock;
use sampler_core::heartbeat::Timestamp;

/// Reads the RP2040 64-bit microsecond timer through embassy-time.
///
/// Reading the timer takes no lock, so the clock is safe to use from core 1
/// while core 0 owns the time driver.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyClock;

impl MonotonicClock for EmbassyClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis_u64(Instant::now().as_millis())
    }

    fn busy_wait(&self, duration: Duration) {
        block_for(super::embassy_duration(duration));
    }
}
