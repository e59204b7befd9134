//! RP2040 adapters for the `sampler-core` hardware traits.

use core::time::Duration;

use embassy_rp::Peripherals;
use embassy_rp::adc::{self, Adc, Blocking, Channel};
#[cfg(feature = "status-led")]
use embassy_rp::gpio::{Level, Output};
use embassy_rp::gpio::Pull;
use embassy_rp::watchdog::Watchdog;
use static_cell::StaticCell;

mod adc_fifo;
mod clock;
mod core1;
mod led;
mod watchdog;

pub use adc_fifo::RpConverter;
pub use clock::EmbassyClock;
pub use core1::Core1Launcher;
pub use led::SharedLed;
pub use watchdog::RpWatchdog;

#[cfg(feature = "status-led")]
pub type BoardLed = SharedLed;
#[cfg(not(feature = "status-led"))]
pub type BoardLed = sampler_core::hal::NoopStatusLed;

/// Driver objects that own the pad and block configuration the worker
/// relies on. They are never touched again, only kept alive.
struct AnalogFrontEnd {
    _adc: Adc<'static, Blocking>,
    _inputs: [Channel<'static>; 5],
    #[cfg(feature = "status-led")]
    _led: Output<'static>,
}

static FRONT_END: StaticCell<AnalogFrontEnd> = StaticCell::new();

/// Board resources handed to the runtime.
pub struct Board {
    pub watchdog: RpWatchdog,
}

/// Brings the converter out of reset, switches the analog pads to their
/// analog function, and claims the watchdog.
pub fn init(p: Peripherals) -> Board {
    let front_end = AnalogFrontEnd {
        _adc: Adc::new_blocking(p.ADC, adc::Config::default()),
        _inputs: [
            Channel::new_pin(p.PIN_26, Pull::None),
            Channel::new_pin(p.PIN_27, Pull::None),
            Channel::new_pin(p.PIN_28, Pull::None),
            Channel::new_pin(p.PIN_29, Pull::None),
            Channel::new_temp_sensor(p.ADC_TEMP_SENSOR),
        ],
        #[cfg(feature = "status-led")]
        _led: Output::new(p.PIN_25, Level::Low),
    };
    FRONT_END.init(front_end);

    Board {
        watchdog: RpWatchdog::new(Watchdog::new(p.WATCHDOG)),
    }
}

/// Handle onto the indicator, or a no-op on boards built without one.
pub fn board_led() -> BoardLed {
    BoardLed::default()
}

pub(crate) fn embassy_duration(duration: Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}
