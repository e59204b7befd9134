use embassy_time::Ticker;
use sampler_core::supervisor::TickOutcome;

use super::{STATUS, Supervisor};
use crate::hw;
use crate::telemetry;

#[embassy_executor::task]
pub async fn run(mut supervisor: Supervisor) -> ! {
    let mut ticker = Ticker::every(hw::embassy_duration(supervisor.config().tick_period));
    let mut seen = supervisor.telemetry().next_event_id();

    loop {
        ticker.next().await;

        if supervisor.tick() != TickOutcome::Healthy {
            for record in supervisor.telemetry().since(seen) {
                telemetry::log_record(record);
            }
            seen = supervisor.telemetry().next_event_id();
        }

        STATUS.signal(supervisor.status());
    }
}
