use embassy_time::{Duration, Timer};
use sampler_core::channels::AnalogPin;

use super::{SHARED, STATUS};
use crate::telemetry;

const REPORT_PERIOD: Duration = Duration::from_secs(5);

/// Periodically logs the supervisor status and reads every scanned pin back
/// through the selection API, the way a consumer on core 0 would.
#[embassy_executor::task]
pub async fn run(pins: &'static [AnalogPin]) -> ! {
    loop {
        Timer::after(REPORT_PERIOD).await;

        let status = STATUS.wait().await;
        telemetry::log_status(&status);

        for &pin in pins {
            SHARED.select_channel(pin);
            telemetry::log_reading(pin, SHARED.read_value());
        }
    }
}
