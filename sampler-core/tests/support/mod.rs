#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use sampler_core::channels::ChannelId;
use sampler_core::hal::{
    AnalogConverter, HardwareWatchdog, MonotonicClock, ResetReason, StatusLed, WorkerLauncher,
};
use sampler_core::heartbeat::Timestamp;

/// Clock that only moves when something busy-waits or the test advances it.
#[derive(Default)]
pub struct SimClock {
    micros: Cell<u64>,
}

impl SimClock {
    pub fn at_millis(millis: u64) -> Self {
        let clock = Self::default();
        clock.set_millis(millis);
        clock
    }

    pub fn set_millis(&self, millis: u64) {
        self.micros.set(millis * 1_000);
    }

    pub fn advance(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).expect("duration fits in u64");
        self.micros.set(self.micros.get() + micros);
    }

    pub fn millis(&self) -> u64 {
        self.micros.get() / 1_000
    }
}

impl MonotonicClock for SimClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis_u64(self.millis())
    }

    fn busy_wait(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConverterOp {
    Reference(bool),
    Select(ChannelId),
    Drain,
    Start,
    Stop,
    Take(Option<u16>),
}

/// Converter fed from per-channel sample scripts.
///
/// Channels without a script convert to `fallback`; channels marked stuck
/// never finish a conversion.
pub struct ScriptedConverter {
    scripts: HashMap<ChannelId, VecDeque<u16>>,
    stuck: Vec<ChannelId>,
    fallback: u16,
    selected: Option<ChannelId>,
    pending: Option<u16>,
    pub ops: Vec<ConverterOp>,
}

impl ScriptedConverter {
    pub fn constant(value: u16) -> Self {
        Self {
            scripts: HashMap::new(),
            stuck: Vec::new(),
            fallback: value,
            selected: None,
            pending: None,
            ops: Vec::new(),
        }
    }

    pub fn script(mut self, channel: ChannelId, samples: &[u16]) -> Self {
        self.scripts
            .entry(channel)
            .or_default()
            .extend(samples.iter().copied());
        self
    }

    pub fn stuck_on(mut self, channel: ChannelId) -> Self {
        self.stuck.push(channel);
        self
    }

    pub fn unstick(&mut self, channel: ChannelId) {
        self.stuck.retain(|stuck| *stuck != channel);
    }
}

impl AnalogConverter for ScriptedConverter {
    fn select(&mut self, channel: ChannelId) {
        self.selected = Some(channel);
        self.ops.push(ConverterOp::Select(channel));
    }

    fn set_reference_enabled(&mut self, enabled: bool) {
        self.ops.push(ConverterOp::Reference(enabled));
    }

    fn drain(&mut self) {
        self.pending = None;
        self.ops.push(ConverterOp::Drain);
    }

    fn start(&mut self) {
        self.ops.push(ConverterOp::Start);
        let channel = self.selected.expect("start without select");
        if self.stuck.contains(&channel) {
            return;
        }
        let sample = self
            .scripts
            .get_mut(&channel)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.fallback);
        self.pending = Some(sample);
    }

    fn stop(&mut self) {
        self.ops.push(ConverterOp::Stop);
    }

    fn is_ready(&mut self) -> bool {
        self.pending.is_some()
    }

    fn take_result(&mut self) -> Option<u16> {
        let result = self.pending.take();
        self.ops.push(ConverterOp::Take(result));
        result
    }
}

pub struct MockWatchdog {
    pub refreshes: u32,
    pub armed_with: Option<Duration>,
    pub reason: ResetReason,
}

impl MockWatchdog {
    pub fn new() -> Self {
        Self::after(ResetReason::PowerOn)
    }

    pub fn after(reason: ResetReason) -> Self {
        Self {
            refreshes: 0,
            armed_with: None,
            reason,
        }
    }
}

impl HardwareWatchdog for MockWatchdog {
    fn start(&mut self, timeout: Duration) {
        self.armed_with = Some(timeout);
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }

    fn last_reset_reason(&self) -> ResetReason {
        self.reason
    }
}

#[derive(Default)]
pub struct MockLauncher {
    pub launches: u32,
    pub relaunches: u32,
}

impl WorkerLauncher for MockLauncher {
    fn launch(&mut self) {
        self.launches += 1;
    }

    fn relaunch(&mut self) {
        self.relaunches += 1;
    }
}

/// LED that counts rising edges and toggles.
#[derive(Default)]
pub struct RecordingLed {
    pub lit: bool,
    pub pulses: u32,
    pub toggles: u32,
}

impl StatusLed for RecordingLed {
    fn set(&mut self, on: bool) {
        if on && !self.lit {
            self.pulses += 1;
        }
        self.lit = on;
    }

    fn toggle(&mut self) {
        self.toggles += 1;
        self.lit = !self.lit;
    }
}

/// Wall clock for tests that run the worker on a real thread.
pub struct StdClock {
    origin: std::time::Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl MonotonicClock for StdClock {
    fn now(&self) -> Timestamp {
        let millis = u64::try_from(self.origin.elapsed().as_millis()).expect("test runs < u64 ms");
        Timestamp::from_millis_u64(millis)
    }

    fn busy_wait(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
