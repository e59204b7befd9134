//! Hardware watchdog adapter.

use core::time::Duration;

use embassy_rp::pac;
use embassy_rp::watchdog::Watchdog;
use sampler_core::hal::{HardwareWatchdog, ResetReason};

pub struct RpWatchdog {
    inner: Watchdog,
}

impl RpWatchdog {
    pub fn new(inner: Watchdog) -> Self {
        Self { inner }
    }
}

impl HardwareWatchdog for RpWatchdog {
    fn start(&mut self, timeout: Duration) {
        // Keep counting while a probe halts the cores so a hang under the
        // debugger still resets the chip.
        self.inner.pause_on_debug(false);
        self.inner.start(super::embassy_duration(timeout));
    }

    fn refresh(&mut self) {
        self.inner.feed();
    }

    fn last_reset_reason(&self) -> ResetReason {
        let reason = pac::WATCHDOG.reason().read();
        if reason.timer() {
            ResetReason::WatchdogTimeout
        } else if reason.force() {
            ResetReason::Forced
        } else {
            ResetReason::PowerOn
        }
    }
}
