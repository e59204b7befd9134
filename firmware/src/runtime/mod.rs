use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use sampler_core::channels::AnalogPin;
use sampler_core::supervisor::{RecoverySupervisor, SupervisorConfig};
use sampler_core::{SamplerStatus, SharedState};

use crate::hw::{self, BoardLed, Core1Launcher, EmbassyClock, RpWatchdog};
use crate::telemetry;

mod report_task;
mod supervisor_task;
pub(crate) mod worker;

/// Inputs scanned from boot: the four analog pads plus the die temperature.
const SCANNED_PINS: [AnalogPin; 5] = [
    AnalogPin::A0,
    AnalogPin::A1,
    AnalogPin::A2,
    AnalogPin::A3,
    AnalogPin::MCU_TEMP,
];

pub(crate) type Supervisor =
    RecoverySupervisor<'static, RpWatchdog, Core1Launcher, EmbassyClock, BoardLed>;

/// State shared by the supervisor on core 0 and the worker on core 1.
pub(crate) static SHARED: SharedState = SharedState::new();

/// Latest status published by the supervisor for the report task.
pub(super) static STATUS: Signal<CriticalSectionRawMutex, SamplerStatus> = Signal::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let board = hw::init(embassy_rp::init(embassy_rp::config::Config::default()));

    for pin in SCANNED_PINS {
        if let Err(err) = SHARED.enable_channel(pin) {
            defmt::warn!("boot: skipping pin {}: {}", pin, err);
        }
    }

    let mut supervisor = Supervisor::new(
        &SHARED,
        board.watchdog,
        Core1Launcher::new(),
        EmbassyClock,
        hw::board_led(),
        SupervisorConfig::default(),
    )
    .expect("supervisor timing");

    let reason = supervisor.start();
    telemetry::log_reset_reason(reason);
    for record in supervisor.telemetry().oldest_first() {
        telemetry::log_record(record);
    }

    spawner
        .spawn(supervisor_task::run(supervisor))
        .expect("failed to spawn supervisor task");

    spawner
        .spawn(report_task::run(&SCANNED_PINS))
        .expect("failed to spawn report task");

    core::future::pending::<()>().await;
}
