//! Register-level driver for the RP2040 SAR converter.
//!
//! The worker on core 1 drives the converter through the result FIFO, one
//! conversion at a time. The embassy `Adc` driver brings the block out of
//! reset on core 0; after that only this type touches the ADC registers.

use embassy_rp::pac;
use sampler_core::channels::ChannelId;
use sampler_core::hal::AnalogConverter;

/// FIFO-backed converter used by the acquisition worker.
pub struct RpConverter(());

impl RpConverter {
    /// Stops any free-running conversion left behind by a previous worker and
    /// enables the result FIFO with a one-sample threshold and no shifting.
    pub fn new() -> Self {
        pac::ADC.cs().modify(|w| w.set_start_many(false));
        pac::ADC.fcs().write(|w| {
            w.set_en(true);
            w.set_shift(false);
            w.set_err(false);
            w.set_dreq_en(false);
            w.set_thresh(1);
        });
        Self(())
    }
}

impl AnalogConverter for RpConverter {
    fn select(&mut self, channel: ChannelId) {
        pac::ADC.cs().modify(|w| w.set_ainsel(channel.raw()));
    }

    fn set_reference_enabled(&mut self, enabled: bool) {
        pac::ADC.cs().modify(|w| w.set_ts_en(enabled));
    }

    fn drain(&mut self) {
        while !pac::ADC.fcs().read().empty() {
            let _ = pac::ADC.fifo().read();
        }
    }

    fn start(&mut self) {
        pac::ADC.cs().modify(|w| w.set_start_many(true));
    }

    fn stop(&mut self) {
        pac::ADC.cs().modify(|w| w.set_start_many(false));
    }

    fn is_ready(&mut self) -> bool {
        !pac::ADC.fcs().read().empty()
    }

    fn take_result(&mut self) -> Option<u16> {
        if pac::ADC.fcs().read().empty() {
            None
        } else {
            Some(pac::ADC.fifo().read().val())
        }
    }
}
