//! State shared between the acquisition core and the control core.
//!
//! One `SharedState` lives in a `static` and both cores receive a `&'static`
//! reference at startup. Each field has exactly one writer:
//!
//! * `registry`: configuration callers on the control core.
//! * `accumulators`, `store` averages, `heartbeat.last_heartbeat`,
//!   `heartbeat.last_indicator`: the acquisition worker.
//! * `store` selection: read-side callers.
//! * `heartbeat.restart_count`: the recovery supervisor.
//!
//! There are no locks. Readers may observe values one pass stale, which every
//! consumer tolerates.

use core::time::Duration;

use crate::channels::{
    AccumulatorCell, AnalogPin, CHANNEL_COUNT, ChannelError, ChannelId, ChannelRegistry,
};
use crate::heartbeat::{HeartbeatState, Timestamp};
use crate::store::SampleStore;
use crate::supervisor::WorkerHealth;

pub struct SharedState {
    pub registry: ChannelRegistry,
    pub accumulators: [AccumulatorCell; CHANNEL_COUNT],
    pub store: SampleStore,
    pub heartbeat: HeartbeatState,
}

impl SharedState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registry: ChannelRegistry::new(),
            accumulators: [const { AccumulatorCell::new() }; CHANNEL_COUNT],
            store: SampleStore::new(),
            heartbeat: HeartbeatState::new(),
        }
    }

    /// Adds the channel behind `pin` to the scan.
    ///
    /// Pins without an analog function leave the registry untouched.
    pub fn enable_channel(&self, pin: AnalogPin) -> Result<ChannelId, ChannelError> {
        let channel = pin.channel()?;
        self.registry.enable(channel.index());
        Ok(channel)
    }

    /// Chooses the channel reported by [`read_value`](Self::read_value).
    ///
    /// No conversion is triggered; the background worker keeps the value fresh.
    pub fn select_channel(&self, pin: AnalogPin) {
        self.store.select(pin);
    }

    /// Latest published average for the selected channel.
    pub fn read_value(&self) -> u16 {
        self.store.read()
    }

    /// Builds a status snapshot as seen at `now`.
    pub fn status(&self, now: Timestamp, hang_threshold: Duration) -> SamplerStatus {
        let heartbeat_age = now.wrapping_since(self.heartbeat.last_heartbeat());
        let health = if self.heartbeat.restart_limit_reached() {
            WorkerHealth::Unrecoverable
        } else if heartbeat_age > hang_threshold {
            WorkerHealth::SuspectedHung
        } else {
            WorkerHealth::Healthy
        };

        SamplerStatus {
            health,
            restart_count: self.heartbeat.restart_count(),
            recovery_pending: self.heartbeat.recovery_pending(),
            heartbeat_age,
            enabled_mask: self.registry.mask(),
            selected: self.store.selected(),
            averages: self.store.averages(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the sampler for diagnostics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SamplerStatus {
    pub health: WorkerHealth,
    pub restart_count: u8,
    pub recovery_pending: bool,
    pub heartbeat_age: Duration,
    pub enabled_mask: u8,
    pub selected: Option<ChannelId>,
    pub averages: [u16; CHANNEL_COUNT],
}

impl SamplerStatus {
    pub fn is_enabled(&self, channel: ChannelId) -> bool {
        self.enabled_mask & (1 << channel.raw()) != 0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SamplerStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{} restarts={} age={}ms enabled={=u8:#b} averages={}",
            self.health,
            self.restart_count,
            self.heartbeat_age.as_millis(),
            self.enabled_mask,
            self.averages
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::STARTUP_AVERAGE;

    #[test]
    fn enabling_an_unmapped_pin_changes_nothing() {
        let shared = SharedState::new();
        assert_eq!(
            shared.enable_channel(AnalogPin(12)),
            Err(ChannelError::UnmappedPin(12))
        );
        assert_eq!(shared.registry.mask(), 0);
    }

    #[test]
    fn status_reports_stale_heartbeat_as_suspected_hang() {
        let shared = SharedState::new();
        shared.enable_channel(AnalogPin::A2).expect("A2 is analog");
        shared.heartbeat.stamp(Timestamp::from_millis(1_000));

        let threshold = Duration::from_secs(15);
        let fresh = shared.status(Timestamp::from_millis(2_000), threshold);
        assert_eq!(fresh.health, WorkerHealth::Healthy);
        assert!(fresh.is_enabled(ChannelId::ADC2));
        assert_eq!(fresh.averages, [STARTUP_AVERAGE; CHANNEL_COUNT]);

        let stale = shared.status(Timestamp::from_millis(16_001), threshold);
        assert_eq!(stale.health, WorkerHealth::SuspectedHung);
        assert_eq!(stale.heartbeat_age, Duration::from_millis(15_001));
    }
}
