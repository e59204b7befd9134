//! Host doubles for the sampler hardware plus the simulation loop.
//!
//! The worker runs on a `std::thread` against a synthetic converter, the
//! supervisor runs on the caller's thread. Simulated time runs `scale` times
//! faster than wall time so a 15 s hang threshold takes a fraction of that to
//! observe.
//!
//! Threads cannot be killed, so every worker thread holds a [`Lease`] on a
//! launch generation. A relaunch bumps the generation; a retired worker parks
//! itself forever the next time it touches the clock, the converter or the
//! LED. A hung worker is spinning inside the converter and parks right away.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use sampler_core::acquisition::AcquisitionWorker;
use sampler_core::channels::{AnalogPin, ChannelError, ChannelId};
use sampler_core::hal::{
    AnalogConverter, HardwareWatchdog, MonotonicClock, ResetReason, StatusLed, WorkerLauncher,
};
use sampler_core::heartbeat::Timestamp;
use sampler_core::supervisor::{ConfigError, RecoverySupervisor, SupervisorConfig, TickOutcome};
use sampler_core::telemetry::TelemetryRecord;
use sampler_core::{SamplerStatus, SharedState};

/// Ticks between status reports.
pub const STATUS_EVERY_TICKS: u32 = 10;

/// Wall-clock spin granularity of a hung converter.
const HANG_SPIN: Duration = Duration::from_millis(1);

/// Clock that runs `scale` times faster than the host clock.
pub struct ScaledClock {
    origin: Instant,
    scale: u32,
}

impl ScaledClock {
    pub fn new(scale: u32) -> Self {
        Self {
            origin: Instant::now(),
            scale: scale.max(1),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed().saturating_mul(self.scale)
    }

    /// Host time that corresponds to `simulated`.
    pub fn to_host(&self, simulated: Duration) -> Duration {
        simulated / self.scale
    }
}

impl MonotonicClock for ScaledClock {
    fn now(&self) -> Timestamp {
        let millis = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp::from_millis_u64(millis)
    }

    fn busy_wait(&self, duration: Duration) {
        thread::sleep(self.to_host(duration));
    }
}

/// Launch generation a worker thread belongs to.
#[derive(Clone)]
pub struct Lease {
    current: Arc<AtomicU32>,
    generation: u32,
}

impl Lease {
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn is_retired(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }

    /// Stops the calling thread for good once its generation was replaced.
    fn check(&self) {
        if self.is_retired() {
            loop {
                thread::park();
            }
        }
    }
}

/// Selects which worker generations hang inside the converter.
#[derive(Default)]
pub struct HangSwitch {
    target: AtomicU32,
}

impl HangSwitch {
    const NONE: u32 = 0;
    const EVERY: u32 = u32::MAX;

    /// Hangs the worker of `generation` only; its replacement runs normally.
    pub fn hang(&self, generation: u32) {
        self.target.store(generation, Ordering::Release);
    }

    /// Hangs every worker, including all future relaunches.
    pub fn hang_every(&self) {
        self.target.store(Self::EVERY, Ordering::Release);
    }

    pub fn hangs(&self, generation: u32) -> bool {
        match self.target.load(Ordering::Acquire) {
            Self::NONE => false,
            Self::EVERY => true,
            target => target == generation,
        }
    }
}

/// Clock handed to a worker thread.
pub struct WorkerClock {
    clock: Arc<ScaledClock>,
    lease: Lease,
}

impl MonotonicClock for WorkerClock {
    fn now(&self) -> Timestamp {
        self.lease.check();
        self.clock.now()
    }

    fn busy_wait(&self, duration: Duration) {
        self.lease.check();
        self.clock.busy_wait(duration);
    }
}

/// Converter producing a slow triangle wave per channel.
pub struct SyntheticConverter {
    lease: Lease,
    hangs: Arc<HangSwitch>,
    selected: Option<ChannelId>,
    reference_enabled: bool,
    pending: Option<u16>,
    phase: [u16; 5],
}

impl SyntheticConverter {
    /// Midpoint for each channel; the internal reference sits near the
    /// RP2040 temperature sensor reading at room temperature.
    const BASE: [u16; 5] = [620, 1_450, 2_280, 3_110, 876];
    const SPAN: u16 = 64;

    fn new(lease: Lease, hangs: Arc<HangSwitch>) -> Self {
        Self {
            lease,
            hangs,
            selected: None,
            reference_enabled: false,
            pending: None,
            phase: [0; 5],
        }
    }

    fn sample(&mut self, channel: ChannelId) -> u16 {
        let phase = &mut self.phase[channel.index()];
        *phase = (*phase + 1) % (2 * Self::SPAN);
        let offset = if *phase < Self::SPAN {
            *phase
        } else {
            2 * Self::SPAN - *phase
        };
        Self::BASE[channel.index()] - Self::SPAN / 2 + offset
    }
}

impl AnalogConverter for SyntheticConverter {
    fn select(&mut self, channel: ChannelId) {
        self.lease.check();
        self.selected = Some(channel);
    }

    fn set_reference_enabled(&mut self, enabled: bool) {
        self.lease.check();
        self.reference_enabled = enabled;
    }

    fn drain(&mut self) {
        self.lease.check();
        self.pending = None;
    }

    fn start(&mut self) {
        self.lease.check();
        let Some(channel) = self.selected else {
            return;
        };
        // The reference channel only converts while its bias is powered.
        if channel.is_internal_reference() && !self.reference_enabled {
            return;
        }
        self.pending = Some(self.sample(channel));
    }

    fn stop(&mut self) {
        self.lease.check();
    }

    fn is_ready(&mut self) -> bool {
        while self.hangs.hangs(self.lease.generation()) {
            self.lease.check();
            thread::sleep(HANG_SPIN);
        }
        self.lease.check();
        self.pending.is_some()
    }

    fn take_result(&mut self) -> Option<u16> {
        self.lease.check();
        self.pending.take()
    }
}

/// LED state observed by the report output.
#[derive(Default)]
pub struct LedState {
    lit: AtomicBool,
    pulses: AtomicU32,
    toggles: AtomicU32,
}

impl LedState {
    pub fn pulses(&self) -> u32 {
        self.pulses.load(Ordering::Relaxed)
    }

    pub fn toggles(&self) -> u32 {
        self.toggles.load(Ordering::Relaxed)
    }
}

/// Handle onto the shared LED. Worker handles carry their lease.
pub struct EmuLed {
    state: Arc<LedState>,
    lease: Option<Lease>,
}

impl StatusLed for EmuLed {
    fn set(&mut self, on: bool) {
        if let Some(lease) = &self.lease {
            lease.check();
        }
        let was = self.state.lit.swap(on, Ordering::Relaxed);
        if on && !was {
            self.state.pulses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn toggle(&mut self) {
        self.state.lit.fetch_xor(true, Ordering::Relaxed);
        self.state.toggles.fetch_add(1, Ordering::Relaxed);
    }
}

/// Watchdog that only reports expiry; the simulation decides what a reset means.
pub struct EmuWatchdog {
    clock: Arc<ScaledClock>,
    timeout: Option<Duration>,
    last_refresh: Timestamp,
    reason: ResetReason,
}

impl EmuWatchdog {
    pub fn new(clock: Arc<ScaledClock>, reason: ResetReason) -> Self {
        Self {
            clock,
            timeout: None,
            last_refresh: Timestamp::ZERO,
            reason,
        }
    }

    /// Whether the countdown would have reset the chip by `now`.
    pub fn expired(&self, now: Timestamp) -> bool {
        self.timeout
            .is_some_and(|timeout| now.wrapping_since(self.last_refresh) > timeout)
    }
}

impl HardwareWatchdog for EmuWatchdog {
    fn start(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
        self.last_refresh = self.clock.now();
    }

    fn refresh(&mut self) {
        self.last_refresh = self.clock.now();
    }

    fn last_reset_reason(&self) -> ResetReason {
        self.reason
    }
}

/// Spawns worker threads, one generation per launch.
pub struct ThreadLauncher {
    shared: Arc<SharedState>,
    clock: Arc<ScaledClock>,
    hangs: Arc<HangSwitch>,
    led: Arc<LedState>,
    generation: Arc<AtomicU32>,
}

impl ThreadLauncher {
    fn spawn(&mut self) {
        let generation = self.generation.load(Ordering::Acquire).wrapping_add(1);
        self.generation.store(generation, Ordering::Release);

        let lease = Lease {
            current: Arc::clone(&self.generation),
            generation,
        };
        let shared = Arc::clone(&self.shared);
        let clock = WorkerClock {
            clock: Arc::clone(&self.clock),
            lease: lease.clone(),
        };
        let converter = SyntheticConverter::new(lease.clone(), Arc::clone(&self.hangs));
        let led = EmuLed {
            state: Arc::clone(&self.led),
            lease: Some(lease),
        };

        let spawned = thread::Builder::new()
            .name(format!("worker-{generation}"))
            .spawn(move || {
                let worker = AcquisitionWorker::new(&shared, converter, clock, led);
                worker.run();
            });
        if let Err(err) = spawned {
            eprintln!("failed to spawn worker generation {generation}: {err}");
        }
    }
}

impl WorkerLauncher for ThreadLauncher {
    fn launch(&mut self) {
        self.spawn();
    }

    fn relaunch(&mut self) {
        self.spawn();
    }
}

pub type EmuSupervisor<'a> =
    RecoverySupervisor<'a, EmuWatchdog, ThreadLauncher, &'a ScaledClock, EmuLed>;

/// Everything the worker threads and the supervisor share.
pub struct World {
    pub shared: Arc<SharedState>,
    pub clock: Arc<ScaledClock>,
    pub hangs: Arc<HangSwitch>,
    pub led: Arc<LedState>,
    generation: Arc<AtomicU32>,
}

impl World {
    pub fn new(scale: u32, pins: &[AnalogPin]) -> Result<Self, ChannelError> {
        let shared = Arc::new(SharedState::new());
        for &pin in pins {
            shared.enable_channel(pin)?;
        }
        Ok(Self {
            shared,
            clock: Arc::new(ScaledClock::new(scale)),
            hangs: Arc::new(HangSwitch::default()),
            led: Arc::new(LedState::default()),
            generation: Arc::new(AtomicU32::new(0)),
        })
    }

    pub fn supervisor(
        &self,
        config: SupervisorConfig,
        reason: ResetReason,
    ) -> Result<EmuSupervisor<'_>, ConfigError> {
        let launcher = ThreadLauncher {
            shared: Arc::clone(&self.shared),
            clock: Arc::clone(&self.clock),
            hangs: Arc::clone(&self.hangs),
            led: Arc::clone(&self.led),
            generation: Arc::clone(&self.generation),
        };
        let led = EmuLed {
            state: Arc::clone(&self.led),
            lease: None,
        };
        RecoverySupervisor::new(
            &self.shared,
            EmuWatchdog::new(Arc::clone(&self.clock), reason),
            launcher,
            &*self.clock,
            led,
            config,
        )
    }

    /// Generation of the worker currently running.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Hangs to inject and how long to run.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    /// Simulated times at which the running worker hangs.
    pub hang_at: Vec<Duration>,
    /// Hang every worker from the first injection on.
    pub persistent: bool,
    pub duration: Duration,
}

/// Things the simulation reports while it runs.
#[derive(Clone, Debug)]
pub enum Event {
    HangInjected { at: Timestamp, generation: u32 },
    Tick { at: Timestamp, outcome: TickOutcome },
    Telemetry(TelemetryRecord),
    Status(SamplerStatus),
    Reading { pin: AnalogPin, value: u16 },
    WatchdogExpired { at: Timestamp },
}

#[derive(Clone, Debug)]
pub struct Summary {
    pub ticks: u32,
    pub watchdog_expired: bool,
    pub status: SamplerStatus,
}

/// Runs the supervisor until the plan's duration elapses or the watchdog
/// would have reset the chip.
pub fn run(
    world: &World,
    supervisor: &mut EmuSupervisor<'_>,
    plan: &Plan,
    pins: &[AnalogPin],
    mut observe: impl FnMut(&Event),
) -> Summary {
    let mut pending_hangs: Vec<Duration> = plan.hang_at.clone();
    pending_hangs.sort_unstable();
    pending_hangs.reverse();

    let tick = world.clock.to_host(supervisor.config().tick_period);
    let mut seen = supervisor.telemetry().next_event_id();
    let mut ticks = 0;
    let mut watchdog_expired = false;

    while world.clock.elapsed() < plan.duration {
        thread::sleep(tick);
        let now = world.clock.now();

        while pending_hangs
            .last()
            .is_some_and(|at| world.clock.elapsed() >= *at)
        {
            pending_hangs.pop();
            let generation = world.generation();
            if plan.persistent {
                world.hangs.hang_every();
            } else {
                world.hangs.hang(generation);
            }
            observe(&Event::HangInjected { at: now, generation });
        }

        let outcome = supervisor.tick();
        ticks += 1;
        observe(&Event::Tick { at: now, outcome });

        for record in supervisor.telemetry().since(seen) {
            observe(&Event::Telemetry(*record));
        }
        seen = supervisor.telemetry().next_event_id();

        if ticks % STATUS_EVERY_TICKS == 0 {
            observe(&Event::Status(supervisor.status()));
            for &pin in pins {
                world.shared.select_channel(pin);
                observe(&Event::Reading {
                    pin,
                    value: world.shared.read_value(),
                });
            }
        }

        if supervisor.watchdog().expired(world.clock.now()) {
            watchdog_expired = true;
            observe(&Event::WatchdogExpired {
                at: world.clock.now(),
            });
            break;
        }
    }

    Summary {
        ticks,
        watchdog_expired,
        status: supervisor.status(),
    }
}
