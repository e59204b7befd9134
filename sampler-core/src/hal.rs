//! Hardware seams consumed by the worker and the supervisor.
//!
//! Firmware implements these against the RP2040 peripherals; the emulator and
//! the tests provide scripted versions.

use core::time::Duration;

use crate::channels::ChannelId;
use crate::heartbeat::Timestamp;

/// Monotonic time source plus a blocking delay.
pub trait MonotonicClock {
    fn now(&self) -> Timestamp;

    /// Spins for at least `duration` without yielding to a scheduler.
    fn busy_wait(&self, duration: Duration);
}

/// Single-shot analog converter primitives.
pub trait AnalogConverter {
    /// Routes the converter input mux to `channel`.
    fn select(&mut self, channel: ChannelId);

    /// Powers the internal reference (temperature sensor bias) up or down.
    fn set_reference_enabled(&mut self, enabled: bool);

    /// Discards any queued results.
    fn drain(&mut self);

    /// Starts converting the selected channel.
    fn start(&mut self);

    /// Stops the converter.
    fn stop(&mut self);

    /// Returns `true` once a result is queued.
    fn is_ready(&mut self) -> bool;

    /// Pops a queued result, if one is available.
    fn take_result(&mut self) -> Option<u16>;
}

/// Why the chip came out of its last reset.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetReason {
    /// Power-on, brown-out, or the RUN pin.
    PowerOn,
    /// The watchdog counted down to zero.
    WatchdogTimeout,
    /// Software forced a watchdog reset.
    Forced,
}

/// Independent countdown timer that resets the chip unless refreshed.
pub trait HardwareWatchdog {
    /// Arms the countdown. Called once during startup.
    fn start(&mut self, timeout: Duration);

    /// Reloads the countdown.
    fn refresh(&mut self);

    /// Reports what caused the last reset.
    fn last_reset_reason(&self) -> ResetReason {
        ResetReason::PowerOn
    }
}

/// Starts the acquisition worker on its dedicated execution context.
///
/// Implementors bind the worker entry point; the supervisor only decides
/// when to call these.
pub trait WorkerLauncher {
    /// First launch of the worker.
    fn launch(&mut self);

    /// Forcibly stops the running worker and starts a fresh one from its
    /// entry point.
    fn relaunch(&mut self);
}

/// On/off indicator output.
pub trait StatusLed {
    fn set(&mut self, on: bool);

    fn toggle(&mut self);
}

/// Indicator used on boards without a status LED.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopStatusLed;

impl NoopStatusLed {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StatusLed for NoopStatusLed {
    fn set(&mut self, _: bool) {}

    fn toggle(&mut self) {}
}

impl<T: StatusLed + ?Sized> StatusLed for &mut T {
    fn set(&mut self, on: bool) {
        (**self).set(on);
    }

    fn toggle(&mut self) {
        (**self).toggle();
    }
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn busy_wait(&self, duration: Duration) {
        (**self).busy_wait(duration);
    }
}
