//! Launching and hard-restarting the worker on core 1.

use core::ptr::addr_of_mut;

use embassy_rp::multicore::{Stack, spawn_core1};
use embassy_rp::peripherals::CORE1;
use sampler_core::hal::WorkerLauncher;

use crate::runtime::worker;

const CORE1_STACK_SIZE: usize = 4096;

static mut CORE1_STACK: Stack<CORE1_STACK_SIZE> = Stack::new();

/// Starts [`worker::entry`] on core 1.
///
/// `spawn_core1` forces core 1 off through the power-state machine before
/// handing it a new entry point, so a relaunch discards whatever the previous
/// worker was doing, including a spin inside the converter poll.
pub struct Core1Launcher(());

impl Core1Launcher {
    pub const fn new() -> Self {
        Self(())
    }
}

impl WorkerLauncher for Core1Launcher {
    fn launch(&mut self) {
        spawn_worker();
    }

    fn relaunch(&mut self) {
        spawn_worker();
    }
}

fn spawn_worker() {
    // SAFETY: only the supervisor on core 0 gets here. `spawn_core1` forces
    // core 1 off before it writes to the stack, so the previous worker can no
    // longer observe the stack or the CORE1 peripheral.
    let (core1, stack) = unsafe { (CORE1::steal(), &mut *addr_of_mut!(CORE1_STACK)) };
    spawn_core1(core1, stack, worker::entry);
}
