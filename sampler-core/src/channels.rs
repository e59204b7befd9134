//! Analog channel identities, enablement, and the oversampling update rule.
//!
//! The sampler tracks a fixed set of five converter inputs: four
//! general-purpose analog pins plus the on-die temperature reference. Logical
//! pin numbers used by the rest of the firmware are mapped onto those
//! indices here, and every per-channel scalar lives in an atomic so the
//! acquisition core and the control core can share it without locking.

use core::{convert::TryFrom, fmt};

use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// Number of converter channels scanned by the acquisition worker.
pub const CHANNEL_COUNT: usize = 5;

/// Number of raw samples folded into one averaging window.
pub const OVERSAMPLE_TARGET: u8 = 16;

/// Physical converter channel index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(u8);

impl ChannelId {
    pub const ADC0: Self = Self(0);
    pub const ADC1: Self = Self(1);
    pub const ADC2: Self = Self(2);
    pub const ADC3: Self = Self(3);
    /// On-die temperature sensor; its bias circuit is only powered during a read.
    pub const INTERNAL_REFERENCE: Self = Self(4);

    /// Every channel in scan order.
    pub const ALL: [Self; CHANNEL_COUNT] = [
        Self::ADC0,
        Self::ADC1,
        Self::ADC2,
        Self::ADC3,
        Self::INTERNAL_REFERENCE,
    ];

    /// Returns the channel for `index`, if it is in range.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < CHANNEL_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_internal_reference(self) -> bool {
        self.0 == Self::INTERNAL_REFERENCE.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_internal_reference() {
            f.write_str("ADC4/temp")
        } else {
            write!(f, "ADC{}", self.0)
        }
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = ChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ChannelError::IndexOutOfRange(value))
    }
}

/// Logical analog pin identifier as used by configuration callers.
///
/// General-purpose inputs are addressed by their GPIO number; the temperature
/// reference has no pad and is addressed through a reserved pseudo-pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogPin(pub u8);

impl AnalogPin {
    pub const A0: Self = Self(26);
    pub const A1: Self = Self(27);
    pub const A2: Self = Self(28);
    pub const A3: Self = Self(29);
    /// Pseudo-pin selecting the MCU temperature reference.
    pub const MCU_TEMP: Self = Self(127);

    /// Maps the logical pin onto its converter channel.
    pub fn channel(self) -> Result<ChannelId, ChannelError> {
        ChannelId::try_from(self)
    }
}

impl TryFrom<AnalogPin> for ChannelId {
    type Error = ChannelError;

    fn try_from(pin: AnalogPin) -> Result<Self, Self::Error> {
        match pin {
            AnalogPin::MCU_TEMP => Ok(ChannelId::INTERNAL_REFERENCE),
            AnalogPin(gpio) if (AnalogPin::A0.0..=AnalogPin::A3.0).contains(&gpio) => {
                Ok(ChannelId(gpio - AnalogPin::A0.0))
            }
            AnalogPin(gpio) => Err(ChannelError::UnmappedPin(gpio)),
        }
    }
}

/// Errors raised when translating identifiers into channels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// The logical pin has no analog function.
    UnmappedPin(u8),
    /// The raw channel index is outside `0..CHANNEL_COUNT`.
    IndexOutOfRange(u8),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::UnmappedPin(pin) => write!(f, "pin {pin} is not an analog input"),
            ChannelError::IndexOutOfRange(index) => {
                write!(f, "channel index {index} exceeds {CHANNEL_COUNT} channels")
            }
        }
    }
}

impl core::error::Error for ChannelError {}

/// Set of channels scanned by the acquisition worker.
///
/// Written by configuration callers on the control core, read once per channel
/// per scan by the worker. Channels can only be switched on.
pub struct ChannelRegistry {
    enabled: [AtomicBool; CHANNEL_COUNT],
}

impl ChannelRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: [const { AtomicBool::new(false) }; CHANNEL_COUNT],
        }
    }

    /// Marks the channel at `index` active. Out-of-range indices are ignored.
    pub fn enable(&self, index: usize) {
        if let Some(flag) = self.enabled.get(index) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Returns `true` when `channel` takes part in the scan.
    pub fn is_enabled(&self, channel: ChannelId) -> bool {
        self.enabled[channel.index()].load(Ordering::Relaxed)
    }

    /// Iterates over the enabled channels in scan order.
    pub fn enabled_channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        ChannelId::ALL
            .into_iter()
            .filter(|channel| self.is_enabled(*channel))
    }

    /// Bitmask of enabled channels (bit n == channel n).
    pub fn mask(&self) -> u8 {
        self.enabled_channels()
            .fold(0, |mask, channel| mask | (1 << channel.raw()))
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Running sum and sample count for one averaging window.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OversamplingAccumulator {
    pub sum: u32,
    pub count: u8,
}

impl OversamplingAccumulator {
    #[must_use]
    pub const fn new() -> Self {
        Self { sum: 0, count: 0 }
    }

    /// Folds `sample` into the window and returns the average to publish.
    ///
    /// A full window found on entry is cleared before the sample is added. A
    /// window that becomes full is cleared after its average is computed, so
    /// the stored count stays below [`OVERSAMPLE_TARGET`].
    pub fn push(&mut self, sample: u16) -> u16 {
        if self.is_full() {
            self.reset();
        }

        self.sum = self.sum.saturating_add(u32::from(sample));
        self.count += 1;
        let average = self.average().unwrap_or(sample);

        if self.is_full() {
            self.reset();
        }

        average
    }

    /// Average of the samples in the window, `None` when the window is empty.
    #[must_use]
    pub fn average(&self) -> Option<u16> {
        if self.count == 0 {
            return None;
        }
        let average = self.sum / u32::from(self.count);
        Some(u16::try_from(average).unwrap_or(u16::MAX))
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.count >= OVERSAMPLE_TARGET
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Shared home of one channel's [`OversamplingAccumulator`].
///
/// Only the acquisition worker writes it. It lives outside the worker so
/// partial windows survive a worker relaunch.
pub struct AccumulatorCell {
    sum: AtomicU32,
    count: AtomicU8,
}

impl AccumulatorCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sum: AtomicU32::new(0),
            count: AtomicU8::new(0),
        }
    }

    pub fn load(&self) -> OversamplingAccumulator {
        OversamplingAccumulator {
            sum: self.sum.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self, accumulator: OversamplingAccumulator) {
        self.sum.store(accumulator.sum, Ordering::Relaxed);
        self.count.store(accumulator.count, Ordering::Relaxed);
    }
}

impl Default for AccumulatorCell {
    fn default() -> Self {
        Self::new()
    }
}
