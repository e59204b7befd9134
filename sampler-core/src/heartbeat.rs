//! Liveness signal shared between the acquisition worker and the supervisor.

use core::time::Duration;

use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// Number of worker relaunches tolerated before the supervisor lets the
/// hardware watchdog reset the chip.
pub const MAX_RESETS: u8 = 5;

/// Monotonic millisecond tick, wrapping after ~49.7 days.
///
/// Stored as a single word so the supervisor can read it while the worker
/// core writes it. Differences use wrapping arithmetic and stay correct
/// across the wrap as long as the two stamps are less than half a period
/// apart.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp(u32);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Truncates a wider tick count onto the wrapping 32-bit clock.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_millis_u64(millis: u64) -> Self {
        Self(millis as u32)
    }

    #[must_use]
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`.
    #[must_use]
    pub const fn wrapping_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.wrapping_sub(earlier.0) as u64)
    }

    /// Returns `self` advanced by `duration`, wrapping like the hardware tick.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn wrapping_add(self, duration: Duration) -> Self {
        Self(self.0.wrapping_add(duration.as_millis() as u32))
    }
}

/// Heartbeat and restart bookkeeping.
///
/// | field              | writer      | readers            |
/// |--------------------|-------------|--------------------|
/// | `last_heartbeat`   | worker      | supervisor, status |
/// | `restart_count`    | supervisor  | status             |
/// | `recovery_pending` | supervisor sets, worker clears | worker |
/// | `last_indicator`   | worker      | worker             |
///
/// `last_indicator` lives here rather than in the worker so the status
/// pattern keeps its cadence across a relaunch.
///
/// Every field is a plain load/store atomic; no read-modify-write is used, so
/// nothing here falls back to a critical section on cores without CAS.
pub struct HeartbeatState {
    last_heartbeat: AtomicU32,
    restart_count: AtomicU8,
    recovery_pending: AtomicBool,
    last_indicator: AtomicU32,
}

impl HeartbeatState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_heartbeat: AtomicU32::new(0),
            restart_count: AtomicU8::new(0),
            recovery_pending: AtomicBool::new(false),
            last_indicator: AtomicU32::new(0),
        }
    }

    /// Records that a scan pass started at `now`.
    pub fn stamp(&self, now: Timestamp) {
        self.last_heartbeat.store(now.as_millis(), Ordering::Release);
    }

    pub fn last_heartbeat(&self) -> Timestamp {
        Timestamp::from_millis(self.last_heartbeat.load(Ordering::Acquire))
    }

    pub fn restart_count(&self) -> u8 {
        self.restart_count.load(Ordering::Relaxed)
    }

    /// Bumps the restart counter by one, saturating at [`MAX_RESETS`], and
    /// returns the new value.
    pub(crate) fn record_restart(&self) -> u8 {
        let next = self.restart_count().saturating_add(1).min(MAX_RESETS);
        self.restart_count.store(next, Ordering::Relaxed);
        next
    }

    pub fn restart_limit_reached(&self) -> bool {
        self.restart_count() >= MAX_RESETS
    }

    pub fn recovery_pending(&self) -> bool {
        self.recovery_pending.load(Ordering::Relaxed)
    }

    pub(crate) fn set_recovery_pending(&self) {
        self.recovery_pending.store(true, Ordering::Relaxed);
    }

    /// When the worker last showed a status pattern.
    pub fn last_indicator(&self) -> Timestamp {
        Timestamp::from_millis(self.last_indicator.load(Ordering::Relaxed))
    }

    pub(crate) fn mark_indicator(&self, now: Timestamp) {
        self.last_indicator.store(now.as_millis(), Ordering::Relaxed);
    }

    /// Clears the recovery flag, returning whether it was set.
    pub(crate) fn take_recovery_pending(&self) -> bool {
        let pending = self.recovery_pending();
        if pending {
            self.recovery_pending.store(false, Ordering::Relaxed);
        }
        pending
    }
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}
