#![no_std]

// Portable acquisition and supervision logic for the dual-core sampler.
//
// Nothing in here touches registers: hardware arrives through the traits in
// `hal`, so the same worker and supervisor run on the RP2040 firmware, the
// host emulator, and the test suite.

pub mod acquisition;
pub mod channels;
pub mod hal;
pub mod heartbeat;
pub mod indicator;
pub mod shared;
pub mod store;
pub mod supervisor;
pub mod telemetry;

pub use shared::{SamplerStatus, SharedState};
