//! Hang detection and bounded recovery for the acquisition worker.
//!
//! The supervisor runs on the control core and is ticked by that core's
//! periodic maintenance path. Every tick proves the control core alive by
//! refreshing the hardware watchdog, checks the worker heartbeat, and
//! relaunches a worker whose heartbeat went stale. After [`MAX_RESETS`]
//! relaunches the supervisor stops refreshing the watchdog for good and the
//! hardware resets the chip.

use core::{fmt, time::Duration};

use crate::hal::{HardwareWatchdog, MonotonicClock, ResetReason, StatusLed, WorkerLauncher};
use crate::heartbeat::{MAX_RESETS, Timestamp};
use crate::shared::{SamplerStatus, SharedState};
use crate::telemetry::{
    HangTelemetry, TELEMETRY_RING_CAPACITY, TelemetryEventKind, TelemetryPayload,
    TelemetryRecorder,
};

/// Heartbeat age beyond which the worker is considered hung.
pub const HANG_THRESHOLD: Duration = Duration::from_secs(15);

/// Default spacing of supervisor ticks.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(500);

/// Longest countdown the RP2040 watchdog can be loaded with.
pub const WATCHDOG_MAX_TIMEOUT: Duration = Duration::from_millis(8_300);

/// Watchdog countdown choices.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WatchdogTimeout {
    #[default]
    Short,
    Long,
}

impl WatchdogTimeout {
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            WatchdogTimeout::Short => Duration::from_secs(4),
            WatchdogTimeout::Long => Duration::from_secs(8),
        }
    }
}

/// Timing used by [`RecoverySupervisor`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SupervisorConfig {
    pub hang_threshold: Duration,
    pub tick_period: Duration,
    pub watchdog_timeout: Duration,
}

impl SupervisorConfig {
    #[must_use]
    pub const fn new(watchdog: WatchdogTimeout) -> Self {
        Self {
            hang_threshold: HANG_THRESHOLD,
            tick_period: DEFAULT_TICK_PERIOD,
            watchdog_timeout: watchdog.duration(),
        }
    }

    /// Checks that ticks come often enough to both feed the watchdog and
    /// observe a hang.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog_timeout <= Duration::from_millis(1) {
            return Err(ConfigError::WatchdogTimeoutTooShort);
        }
        if self.watchdog_timeout > WATCHDOG_MAX_TIMEOUT {
            return Err(ConfigError::WatchdogTimeoutTooLong);
        }
        if self.tick_period >= self.watchdog_timeout {
            return Err(ConfigError::TickSlowerThanWatchdog);
        }
        if self.tick_period >= self.hang_threshold {
            return Err(ConfigError::TickSlowerThanHangThreshold);
        }
        Ok(())
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::new(WatchdogTimeout::default())
    }
}

/// Rejected supervisor timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    WatchdogTimeoutTooShort,
    WatchdogTimeoutTooLong,
    TickSlowerThanWatchdog,
    TickSlowerThanHangThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigError::WatchdogTimeoutTooShort => "watchdog timeout must exceed 1 ms",
            ConfigError::WatchdogTimeoutTooLong => "watchdog timeout exceeds hardware maximum",
            ConfigError::TickSlowerThanWatchdog => {
                "supervisor tick period must be shorter than the watchdog timeout"
            }
            ConfigError::TickSlowerThanHangThreshold => {
                "supervisor tick period must be shorter than the hang threshold"
            }
        })
    }
}

impl core::error::Error for ConfigError {}

/// Worker health as judged from the heartbeat.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WorkerHealth {
    Healthy,
    SuspectedHung,
    /// Relaunch budget exhausted; waiting for the watchdog reset.
    Unrecoverable,
}

/// Result of a single [`RecoverySupervisor::tick`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// Watchdog refreshed, heartbeat fresh.
    Healthy,
    /// Watchdog refreshed and a hung worker was relaunched.
    Relaunched { attempt: u8, stale_for: Duration },
    /// Watchdog refresh withheld. `first` is set on the first such tick.
    Halted { first: bool },
}

impl TickOutcome {
    #[must_use]
    pub const fn refreshed_watchdog(self) -> bool {
        !matches!(self, TickOutcome::Halted { .. })
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TickOutcome {
    fn format(&self, f: defmt::Formatter) {
        match self {
            TickOutcome::Healthy => defmt::write!(f, "Healthy"),
            TickOutcome::Relaunched { attempt, stale_for } => defmt::write!(
                f,
                "Relaunched {{ attempt: {}, stale_for: {}ms }}",
                attempt,
                stale_for.as_millis()
            ),
            TickOutcome::Halted { first } => defmt::write!(f, "Halted {{ first: {} }}", first),
        }
    }
}

/// Periodic liveness check for the acquisition worker.
pub struct RecoverySupervisor<'a, W, L, C, S, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    shared: &'a SharedState,
    watchdog: W,
    launcher: L,
    clock: C,
    led: S,
    config: SupervisorConfig,
    halt_recorded: bool,
    telemetry: TelemetryRecorder<CAPACITY>,
}

impl<'a, W, L, C, S, const CAPACITY: usize> RecoverySupervisor<'a, W, L, C, S, CAPACITY>
where
    W: HardwareWatchdog,
    L: WorkerLauncher,
    C: MonotonicClock,
    S: StatusLed,
{
    pub fn new(
        shared: &'a SharedState,
        watchdog: W,
        launcher: L,
        clock: C,
        led: S,
        config: SupervisorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            shared,
            watchdog,
            launcher,
            clock,
            led,
            config,
            halt_recorded: false,
            telemetry: TelemetryRecorder::new(),
        })
    }

    /// Arms the watchdog, notes why the chip last reset, and launches the
    /// worker for the first time.
    pub fn start(&mut self) -> ResetReason {
        let now = self.clock.now();
        let reason = self.watchdog.last_reset_reason();
        if reason == ResetReason::WatchdogTimeout {
            self.telemetry.record(
                TelemetryEventKind::WatchdogResetObserved,
                TelemetryPayload::None,
                now,
            );
        }

        self.watchdog.start(self.config.watchdog_timeout);
        self.launcher.launch();
        self.telemetry
            .record(TelemetryEventKind::WorkerLaunched, TelemetryPayload::None, now);
        reason
    }

    /// One supervision step; call at least once per [`SupervisorConfig::tick_period`].
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();

        let outcome = if self.shared.heartbeat.restart_limit_reached() {
            self.halt(now)
        } else {
            self.watchdog.refresh();
            self.check_worker(now)
        };

        self.led.toggle();
        outcome
    }

    fn halt(&mut self, now: Timestamp) -> TickOutcome {
        let first = !self.halt_recorded;
        if first {
            self.halt_recorded = true;
            self.telemetry.record(
                TelemetryEventKind::RestartLimitReached,
                TelemetryPayload::Restarts(self.shared.heartbeat.restart_count()),
                now,
            );
        }
        TickOutcome::Halted { first }
    }

    fn check_worker(&mut self, now: Timestamp) -> TickOutcome {
        let stale_for = self.stale_for(now);
        if stale_for <= self.config.hang_threshold {
            return TickOutcome::Healthy;
        }

        let attempt = self.shared.heartbeat.record_restart();
        self.telemetry.record(
            TelemetryEventKind::HangDetected,
            TelemetryPayload::Hang(HangTelemetry::new(stale_for, attempt)),
            now,
        );

        self.shared.heartbeat.set_recovery_pending();
        self.launcher.relaunch();
        self.telemetry.record(
            TelemetryEventKind::WorkerRelaunched,
            TelemetryPayload::Restarts(attempt),
            now,
        );

        TickOutcome::Relaunched { attempt, stale_for }
    }

    /// Age of the worker heartbeat at `now`.
    ///
    /// A relaunch does not reset it; a replacement that never stamps is
    /// relaunched again on the next tick.
    pub fn stale_for(&self, now: Timestamp) -> Duration {
        now.wrapping_since(self.shared.heartbeat.last_heartbeat())
    }

    pub fn health(&self) -> WorkerHealth {
        self.status().health
    }

    pub fn status(&self) -> SamplerStatus {
        self.shared
            .status(self.clock.now(), self.config.hang_threshold)
    }

    pub fn restart_count(&self) -> u8 {
        self.shared.heartbeat.restart_count()
    }

    pub fn remaining_restarts(&self) -> u8 {
        MAX_RESETS.saturating_sub(self.restart_count())
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<CAPACITY> {
        &self.telemetry
    }

    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn led(&self) -> &S {
        &self.led
    }
}
