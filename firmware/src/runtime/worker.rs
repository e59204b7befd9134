//! Core 1 entry point.

use sampler_core::acquisition::AcquisitionWorker;

use super::SHARED;
use crate::hw::{self, EmbassyClock, RpConverter};
use crate::telemetry;

/// Runs the acquisition worker until core 1 is reset.
///
/// Every (re)launch starts here with fresh local state; the accumulators and
/// published averages in [`SHARED`] carry over.
pub fn entry() -> ! {
    telemetry::log_worker_started();
    AcquisitionWorker::new(&SHARED, RpConverter::new(), EmbassyClock, hw::board_led()).run()
}
