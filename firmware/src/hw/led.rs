//! Status LED shared by both cores.
//!
//! Core 0 toggles it on every supervisor tick and core 1 pulses it from the
//! worker. Both go through the SIO set/clear/xor aliases, which are single
//! writes, so neither core needs a lock or a read-modify-write.

use embassy_rp::pac;
use sampler_core::hal::StatusLed;

/// On-board LED of the Pico.
pub const LED_PIN: u8 = 25;

const LED_MASK: u32 = 1 << LED_PIN;

/// Handle onto the LED pin. The pin itself is configured once by
/// [`super::init`]; handles can be created freely on either core.
#[derive(Copy, Clone, Debug, Default)]
pub struct SharedLed;

impl StatusLed for SharedLed {
    fn set(&mut self, on: bool) {
        let out = pac::SIO.gpio_out(0);
        if on {
            out.value_set().write_value(LED_MASK);
        } else {
            out.value_clr().write_value(LED_MASK);
        }
    }

    fn toggle(&mut self) {
        pac::SIO.gpio_out(0).value_xor().write_value(LED_MASK);
    }
}
