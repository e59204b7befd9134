//! Published per-channel averages and the read-side channel selection.

use portable_atomic::{AtomicU8, AtomicU16, Ordering};

use crate::channels::{AnalogPin, CHANNEL_COUNT, ChannelId};

/// Value reported for a channel that has never produced a sample.
pub const STARTUP_AVERAGE: u16 = 512;

/// Selection marker for a pin that maps to no channel.
const NO_SELECTION: u8 = u8::MAX;

/// Latest averaged value per channel.
///
/// The worker publishes after every sample; readers on the control core see
/// whichever value was stored last and never wait for a conversion.
pub struct SampleStore {
    averages: [AtomicU16; CHANNEL_COUNT],
    selected: AtomicU8,
}

impl SampleStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            averages: [const { AtomicU16::new(STARTUP_AVERAGE) }; CHANNEL_COUNT],
            selected: AtomicU8::new(NO_SELECTION),
        }
    }

    pub fn publish(&self, channel: ChannelId, average: u16) {
        self.averages[channel.index()].store(average, Ordering::Relaxed);
    }

    pub fn average(&self, channel: ChannelId) -> u16 {
        self.averages[channel.index()].load(Ordering::Relaxed)
    }

    /// Snapshot of every published average in channel order.
    pub fn averages(&self) -> [u16; CHANNEL_COUNT] {
        ChannelId::ALL.map(|channel| self.average(channel))
    }

    /// Remembers which pin subsequent [`read`](Self::read) calls report.
    ///
    /// Pins without an analog channel are still recorded; reads then return
    /// [`STARTUP_AVERAGE`].
    pub fn select(&self, pin: AnalogPin) {
        let raw = pin.channel().map_or(NO_SELECTION, ChannelId::raw);
        self.selected.store(raw, Ordering::Relaxed);
    }

    pub fn selected(&self) -> Option<ChannelId> {
        ChannelId::new(self.selected.load(Ordering::Relaxed))
    }

    /// Returns the published average of the selected channel.
    pub fn read(&self) -> u16 {
        self.selected()
            .map_or(STARTUP_AVERAGE, |channel| self.average(channel))
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}
