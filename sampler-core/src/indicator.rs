//! Blink patterns shown by the acquisition core.

use core::time::Duration;

use crate::hal::{MonotonicClock, StatusLed};

/// On-time and off-time of a single pulse.
pub const PULSE_WIDTH: Duration = Duration::from_millis(100);

/// Pattern the worker shows on each indicator period.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulsePattern {
    /// Double pulse: acquisition is running.
    Alive,
    /// Triple pulse: the worker was relaunched since the last pattern.
    Recovered,
}

impl PulsePattern {
    #[must_use]
    pub const fn pulses(self) -> u8 {
        match self {
            PulsePattern::Alive => 2,
            PulsePattern::Recovered => 3,
        }
    }

    /// Wall time spent blinking the pattern with pulses of `width`.
    #[must_use]
    pub const fn duration(self, width: Duration) -> Duration {
        let edges = self.pulses() as u32 * 2 - 1;
        width.saturating_mul(edges)
    }
}

/// Blinks `pattern` on `led`, busy-waiting between edges. The LED is left off.
pub fn emit<L, C>(led: &mut L, clock: &C, pattern: PulsePattern, width: Duration)
where
    L: StatusLed + ?Sized,
    C: MonotonicClock + ?Sized,
{
    let pulses = pattern.pulses();
    for pulse in 0..pulses {
        led.set(true);
        clock.busy_wait(width);
        led.set(false);
        if pulse + 1 < pulses {
            clock.busy_wait(width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    use crate::heartbeat::Timestamp;

    struct CountingClock {
        waited: Cell<Duration>,
    }

    impl MonotonicClock for CountingClock {
        fn now(&self) -> Timestamp {
            Timestamp::ZERO
        }

        fn busy_wait(&self, duration: Duration) {
            self.waited.set(self.waited.get() + duration);
        }
    }

    #[derive(Default)]
    struct EdgeLed {
        rising: u8,
        lit: bool,
    }

    impl StatusLed for EdgeLed {
        fn set(&mut self, on: bool) {
            if on && !self.lit {
                self.rising += 1;
            }
            self.lit = on;
        }

        fn toggle(&mut self) {
            let next = !self.lit;
            self.set(next);
        }
    }

    #[test]
    fn recovered_pattern_pulses_three_times_without_trailing_gap() {
        let clock = CountingClock {
            waited: Cell::new(Duration::ZERO),
        };
        let mut led = EdgeLed::default();

        emit(&mut led, &clock, PulsePattern::Recovered, PULSE_WIDTH);

        assert_eq!(led.rising, 3);
        assert!(!led.lit);
        assert_eq!(clock.waited.get(), Duration::from_millis(500));
        assert_eq!(
            PulsePattern::Recovered.duration(PULSE_WIDTH),
            clock.waited.get()
        );
    }

    #[test]
    fn alive_pattern_pulses_twice() {
        assert_eq!(PulsePattern::Alive.pulses(), 2);
        assert_eq!(
            PulsePattern::Alive.duration(PULSE_WIDTH),
            Duration::from_millis(300)
        );
    }
}
