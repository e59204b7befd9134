//! Continuous oversampling acquisition loop.
//!
//! The worker owns the converter and runs forever on the acquisition core.
//! Each pass stamps the heartbeat, converts every enabled channel once in
//! index order, folds the samples into the shared oversampling windows, and
//! publishes a fresh average after every single sample. The only way this
//! loop fails is by not coming back around to the next heartbeat stamp.

use core::time::Duration;

use crate::channels::ChannelId;
use crate::hal::{AnalogConverter, MonotonicClock, StatusLed};
use crate::heartbeat::Timestamp;
use crate::indicator::{self, PULSE_WIDTH, PulsePattern};
use crate::shared::SharedState;

/// Delay between routing the mux and starting a conversion.
pub const SETTLE_DELAY: Duration = Duration::from_micros(100);

/// Polls allowed while waiting for one conversion.
pub const POLL_ATTEMPTS: u32 = 10_000;

/// Spacing between completion polls.
pub const POLL_STEP: Duration = Duration::from_micros(1);

/// Pause between the end of one pass and the start of the next.
pub const SCAN_INTERVAL: Duration = Duration::from_millis(10);

/// Wall-clock period of the status pattern.
pub const INDICATOR_PERIOD: Duration = Duration::from_secs(2);

/// Bounded retry budget for a busy-poll.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PollBudget {
    pub attempts: u32,
    pub step: Duration,
}

impl PollBudget {
    #[must_use]
    pub const fn new(attempts: u32, step: Duration) -> Self {
        Self { attempts, step }
    }

    /// Upper bound on the time a poll with this budget can spin.
    #[must_use]
    pub const fn worst_case(&self) -> Duration {
        self.step.saturating_mul(self.attempts)
    }
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::new(POLL_ATTEMPTS, POLL_STEP)
    }
}

/// Spins on `ready` until it reports `true` or the budget is spent.
///
/// `ready` is checked before every wait, so a condition that already holds
/// costs no delay. Returns the final state of the condition.
pub fn poll_until<C, F>(clock: &C, budget: PollBudget, mut ready: F) -> bool
where
    C: MonotonicClock + ?Sized,
    F: FnMut() -> bool,
{
    for _ in 0..budget.attempts {
        if ready() {
            return true;
        }
        clock.busy_wait(budget.step);
    }
    ready()
}

/// Fixed timing of the acquisition loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AcquisitionTiming {
    pub settle: Duration,
    pub poll: PollBudget,
    pub scan_interval: Duration,
    pub indicator_period: Duration,
    pub pulse_width: Duration,
}

impl AcquisitionTiming {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            settle: SETTLE_DELAY,
            poll: PollBudget::new(POLL_ATTEMPTS, POLL_STEP),
            scan_interval: SCAN_INTERVAL,
            indicator_period: INDICATOR_PERIOD,
            pulse_width: PULSE_WIDTH,
        }
    }
}

impl Default for AcquisitionTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened during one pass. Diagnostics only; the loop never acts on it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PassReport {
    pub started_at: Timestamp,
    /// Bitmask of channels converted this pass.
    pub sampled: u8,
    /// Bitmask of channels whose conversion timed out and counted as zero.
    pub timed_out: u8,
    pub pattern: Option<PulsePattern>,
}

/// Acquisition loop bound to its hardware.
///
/// Everything held here is local to one launch of the worker and is dropped
/// when the supervisor relaunches it; the oversampling windows, published
/// averages and indicator phase live in [`SharedState`] and carry over.
pub struct AcquisitionWorker<'a, A, C, L> {
    shared: &'a SharedState,
    converter: A,
    clock: C,
    led: L,
    timing: AcquisitionTiming,
}

impl<'a, A, C, L> AcquisitionWorker<'a, A, C, L>
where
    A: AnalogConverter,
    C: MonotonicClock,
    L: StatusLed,
{
    pub fn new(shared: &'a SharedState, converter: A, clock: C, led: L) -> Self {
        Self {
            shared,
            converter,
            clock,
            led,
            timing: AcquisitionTiming::new(),
        }
    }

    pub fn converter(&self) -> &A {
        &self.converter
    }

    pub fn converter_mut(&mut self) -> &mut A {
        &mut self.converter
    }

    /// Runs passes forever.
    pub fn run(mut self) -> ! {
        loop {
            self.run_pass();
        }
    }

    /// Executes one full scan pass including the trailing inter-pass delay.
    pub fn run_pass(&mut self) -> PassReport {
        let started_at = self.clock.now();
        self.shared.heartbeat.stamp(started_at);

        let mut report = PassReport {
            started_at,
            ..PassReport::default()
        };

        for channel in ChannelId::ALL {
            if !self.shared.registry.is_enabled(channel) {
                continue;
            }

            let bit = 1 << channel.raw();
            report.sampled |= bit;
            let sample = self.convert(channel).unwrap_or_else(|| {
                report.timed_out |= bit;
                0
            });
            self.accumulate(channel, sample);
        }

        report.pattern = self.drive_indicator();
        self.clock.busy_wait(self.timing.scan_interval);
        report
    }

    /// Converts `channel` once. `None` when the conversion did not finish
    /// within the poll budget.
    fn convert(&mut self, channel: ChannelId) -> Option<u16> {
        let reference = channel.is_internal_reference();
        if reference {
            self.converter.set_reference_enabled(true);
        }

        self.converter.select(channel);
        self.clock.busy_wait(self.timing.settle);
        self.converter.drain();
        self.converter.start();

        let converter = &mut self.converter;
        poll_until(&self.clock, self.timing.poll, || converter.is_ready());

        self.converter.stop();
        let reading = self.converter.take_result();

        if reference {
            self.converter.set_reference_enabled(false);
        }

        reading
    }

    fn accumulate(&mut self, channel: ChannelId, sample: u16) {
        let cell = &self.shared.accumulators[channel.index()];
        let mut window = cell.load();
        let average = window.push(sample);
        cell.store(window);
        self.shared.store.publish(channel, average);
    }

    fn drive_indicator(&mut self) -> Option<PulsePattern> {
        let now = self.clock.now();
        let last = self.shared.heartbeat.last_indicator();
        if now.wrapping_since(last) < self.timing.indicator_period {
            return None;
        }
        self.shared.heartbeat.mark_indicator(now);

        let pattern = if self.shared.heartbeat.take_recovery_pending() {
            PulsePattern::Recovered
        } else {
            PulsePattern::Alive
        };
        indicator::emit(&mut self.led, &self.clock, pattern, self.timing.pulse_width);
        Some(pattern)
    }
}
