//! Supervisor event ring.
//!
//! The supervisor records every launch, hang, and escalation into a
//! fixed-capacity history so the firmware can log them and diagnostics can
//! replay the recent past. Oldest entries are overwritten first.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::heartbeat::Timestamp;

/// Total number of supervisor events retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Discriminated supervisor events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    /// The previous reset was caused by the hardware watchdog.
    WatchdogResetObserved,
    /// Worker started for the first time.
    WorkerLaunched,
    /// Heartbeat went stale; the worker is presumed hung.
    HangDetected,
    /// Worker was terminated and started again.
    WorkerRelaunched,
    /// Relaunch budget exhausted; watchdog refresh is withheld from now on.
    RestartLimitReached,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TelemetryEventKind::WatchdogResetObserved => "watchdog-reset-observed",
            TelemetryEventKind::WorkerLaunched => "worker-launched",
            TelemetryEventKind::HangDetected => "hang-detected",
            TelemetryEventKind::WorkerRelaunched => "worker-relaunched",
            TelemetryEventKind::RestartLimitReached => "restart-limit-reached",
        })
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryPayload {
    None,
    /// Heartbeat age at detection and the relaunch attempt it triggered.
    Hang(HangTelemetry),
    /// Restart counter after the event.
    Restarts(u8),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HangTelemetry {
    pub stale_for: Duration,
    pub attempt: u8,
}

impl HangTelemetry {
    #[must_use]
    pub const fn new(stale_for: Duration, attempt: u8) -> Self {
        Self { stale_for, attempt }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HangTelemetry {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "stale {}ms attempt {}",
            self.stale_for.as_millis(),
            self.attempt
        );
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Records supervisor events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent record, if any.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Id that the next recorded event will receive.
    pub fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Retained records with an id of at least `since`, oldest first.
    pub fn since(&self, since: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        self.oldest_first().filter(move |record| record.id >= since)
    }

    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        details: TelemetryPayload,
        timestamp: Timestamp,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
