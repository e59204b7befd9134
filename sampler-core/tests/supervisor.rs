mod support;

use std::time::Duration;

use sampler_core::SharedState;
use sampler_core::hal::{MonotonicClock, ResetReason};
use sampler_core::heartbeat::{MAX_RESETS, Timestamp};
use sampler_core::supervisor::{
    HANG_THRESHOLD, RecoverySupervisor, SupervisorConfig, TickOutcome, WatchdogTimeout,
    WorkerHealth,
};
use sampler_core::telemetry::{HangTelemetry, TelemetryEventKind, TelemetryPayload};

use support::{MockLauncher, MockWatchdog, RecordingLed, SimClock};

type TestSupervisor<'a> =
    RecoverySupervisor<'a, MockWatchdog, MockLauncher, &'a SimClock, RecordingLed>;

fn supervisor<'a>(shared: &'a SharedState, clock: &'a SimClock) -> TestSupervisor<'a> {
    supervisor_after(shared, clock, ResetReason::PowerOn)
}

fn supervisor_after<'a>(
    shared: &'a SharedState,
    clock: &'a SimClock,
    reason: ResetReason,
) -> TestSupervisor<'a> {
    RecoverySupervisor::new(
        shared,
        MockWatchdog::after(reason),
        MockLauncher::default(),
        clock,
        RecordingLed::default(),
        SupervisorConfig::default(),
    )
    .expect("default config is valid")
}

#[test]
fn fresh_heartbeat_refreshes_watchdog_without_relaunch() {
    let shared = SharedState::new();
    let clock = SimClock::at_millis(1_000);
    let mut supervisor = supervisor(&shared, &clock);

    for _ in 0..10 {
        shared.heartbeat.stamp(clock.now());
        clock.advance(Duration::from_millis(500));
        assert_eq!(supervisor.tick(), TickOutcome::Healthy);
    }

    assert_eq!(supervisor.watchdog().refreshes, 10);
    assert_eq!(supervisor.launcher().relaunches, 0);
    assert_eq!(supervisor.restart_count(), 0);
    assert_eq!(supervisor.health(), WorkerHealth::Healthy);
}

#[test]
fn heartbeat_exactly_at_threshold_is_not_a_hang() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    clock.advance(HANG_THRESHOLD);
    assert_eq!(supervisor.tick(), TickOutcome::Healthy);
    assert_eq!(supervisor.launcher().relaunches, 0);
}

#[test]
fn stale_heartbeat_relaunches_worker_once() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    clock.advance(Duration::from_secs(16));
    assert_eq!(supervisor.health(), WorkerHealth::SuspectedHung);

    let outcome = supervisor.tick();

    assert_eq!(
        outcome,
        TickOutcome::Relaunched {
            attempt: 1,
            stale_for: Duration::from_secs(16)
        }
    );
    assert_eq!(supervisor.restart_count(), 1);
    assert_eq!(supervisor.launcher().relaunches, 1);
    assert_eq!(supervisor.watchdog().refreshes, 1);
    assert!(shared.heartbeat.recovery_pending());

    // The replacement worker stamps on its first pass.
    shared.heartbeat.stamp(clock.now());
    assert_eq!(supervisor.health(), WorkerHealth::Healthy);
}

#[test]
fn many_missed_thresholds_still_count_one_restart_per_tick() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    clock.advance(HANG_THRESHOLD * 4);
    supervisor.tick();

    assert_eq!(supervisor.restart_count(), 1);
    assert_eq!(supervisor.launcher().relaunches, 1);
}

#[test]
fn replacement_that_never_stamps_is_relaunched_on_the_next_tick() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    clock.advance(Duration::from_secs(16));
    assert!(matches!(
        supervisor.tick(),
        TickOutcome::Relaunched { attempt: 1, .. }
    ));

    clock.advance(Duration::from_millis(500));
    assert_eq!(
        supervisor.tick(),
        TickOutcome::Relaunched {
            attempt: 2,
            stale_for: Duration::from_millis(16_500)
        }
    );
}

#[test]
fn silent_workers_escalate_to_the_watchdog_within_a_few_ticks() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    clock.advance(Duration::from_secs(16));
    let mut ticks = 0;
    while supervisor.tick().refreshed_watchdog() {
        ticks += 1;
        assert!(ticks <= u32::from(MAX_RESETS), "restart budget never ran out");
        clock.advance(Duration::from_millis(500));
    }

    assert_eq!(ticks, u32::from(MAX_RESETS));
    assert_eq!(supervisor.health(), WorkerHealth::Unrecoverable);
}

#[test]
fn replacement_that_stamps_stays_healthy() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    clock.advance(Duration::from_secs(16));
    supervisor.tick();

    for _ in 0..40 {
        shared.heartbeat.stamp(clock.now());
        clock.advance(Duration::from_millis(500));
        assert_eq!(supervisor.tick(), TickOutcome::Healthy);
    }
    assert_eq!(supervisor.restart_count(), 1);
}

#[test]
fn restart_budget_exhaustion_withholds_watchdog_forever() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    let hangs = u32::from(MAX_RESETS) + 3;
    for hang in 1..=hangs {
        clock.advance(Duration::from_secs(16));
        let outcome = supervisor.tick();

        if hang <= u32::from(MAX_RESETS) {
            assert!(matches!(
                outcome,
                TickOutcome::Relaunched { attempt, .. } if u32::from(attempt) == hang
            ));
            assert_eq!(supervisor.watchdog().refreshes, hang);
        } else {
            assert_eq!(
                outcome,
                TickOutcome::Halted {
                    first: hang == u32::from(MAX_RESETS) + 1
                }
            );
            assert_eq!(supervisor.watchdog().refreshes, u32::from(MAX_RESETS));
        }
        assert!(supervisor.restart_count() <= MAX_RESETS);
    }

    assert_eq!(supervisor.restart_count(), MAX_RESETS);
    assert_eq!(supervisor.launcher().relaunches, u32::from(MAX_RESETS));
    assert_eq!(supervisor.remaining_restarts(), 0);
    assert_eq!(supervisor.health(), WorkerHealth::Unrecoverable);

    // A healthy heartbeat no longer helps: the system is judged unrecoverable.
    shared.heartbeat.stamp(clock.now());
    assert!(!supervisor.tick().refreshed_watchdog());
    assert_eq!(supervisor.watchdog().refreshes, u32::from(MAX_RESETS));
}

#[test]
fn fifth_hang_exhausts_budget_and_sixth_tick_skips_refresh() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    for _ in 0..5 {
        clock.advance(Duration::from_secs(16));
        supervisor.tick();
    }
    assert_eq!(supervisor.restart_count(), 5);
    let refreshes = supervisor.watchdog().refreshes;

    clock.advance(Duration::from_secs(1));
    assert_eq!(supervisor.tick(), TickOutcome::Halted { first: true });
    assert_eq!(supervisor.watchdog().refreshes, refreshes);
}

#[test]
fn liveness_led_toggles_on_every_tick_including_halted_ones() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    let mut ticks = 0;
    for _ in 0..MAX_RESETS {
        clock.advance(Duration::from_secs(16));
        supervisor.tick();
        ticks += 1;
    }
    for _ in 0..4 {
        clock.advance(Duration::from_millis(500));
        supervisor.tick();
        ticks += 1;
    }

    assert_eq!(supervisor.led().toggles, ticks);
}

#[test]
fn start_arms_watchdog_and_launches_worker() {
    let shared = SharedState::new();
    let clock = SimClock::at_millis(20_000);
    let mut supervisor = supervisor(&shared, &clock);

    assert_eq!(supervisor.start(), ResetReason::PowerOn);

    assert_eq!(
        supervisor.watchdog().armed_with,
        Some(WatchdogTimeout::Short.duration())
    );
    assert_eq!(supervisor.launcher().launches, 1);
    assert_eq!(supervisor.launcher().relaunches, 0);

    let events: Vec<TelemetryEventKind> = supervisor
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .collect();
    assert_eq!(events, [TelemetryEventKind::WorkerLaunched]);

    // The worker stamps shortly after launch.
    clock.advance(Duration::from_millis(10));
    shared.heartbeat.stamp(clock.now());
    clock.advance(Duration::from_secs(1));
    assert_eq!(supervisor.tick(), TickOutcome::Healthy);
}

#[test]
fn launch_does_not_refresh_a_stale_heartbeat() {
    let shared = SharedState::new();
    let clock = SimClock::at_millis(20_000);
    let mut supervisor = supervisor(&shared, &clock);

    supervisor.start();
    clock.advance(Duration::from_secs(1));

    assert!(matches!(
        supervisor.tick(),
        TickOutcome::Relaunched { attempt: 1, .. }
    ));
}

#[test]
fn watchdog_caused_reset_is_recorded_at_start() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor_after(&shared, &clock, ResetReason::WatchdogTimeout);

    assert_eq!(supervisor.start(), ResetReason::WatchdogTimeout);

    let first = supervisor
        .telemetry()
        .oldest_first()
        .next()
        .copied()
        .expect("events recorded");
    assert_eq!(first.event, TelemetryEventKind::WatchdogResetObserved);
}

#[test]
fn hang_telemetry_describes_the_recovery() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    clock.advance(Duration::from_secs(20));
    supervisor.tick();

    let records: Vec<_> = supervisor.telemetry().oldest_first().copied().collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].event, TelemetryEventKind::HangDetected);
    assert_eq!(
        records[0].details,
        TelemetryPayload::Hang(HangTelemetry::new(Duration::from_secs(20), 1))
    );
    assert_eq!(records[1].event, TelemetryEventKind::WorkerRelaunched);
    assert_eq!(records[1].details, TelemetryPayload::Restarts(1));
    assert_eq!(records[1].timestamp, Timestamp::from_millis(20_000));
}

#[test]
fn restart_limit_is_recorded_once() {
    let shared = SharedState::new();
    let clock = SimClock::default();
    let mut supervisor = supervisor(&shared, &clock);

    for _ in 0..u32::from(MAX_RESETS) + 3 {
        clock.advance(Duration::from_secs(16));
        supervisor.tick();
    }

    let limit_events = supervisor
        .telemetry()
        .oldest_first()
        .filter(|record| record.event == TelemetryEventKind::RestartLimitReached)
        .count();
    assert_eq!(limit_events, 1);
}
