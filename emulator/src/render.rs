//! Terminal formatting of simulation events.

use crossterm::style::{StyledContent, Stylize};
use sampler_core::SamplerStatus;
use sampler_core::hal::ResetReason;
use sampler_core::heartbeat::Timestamp;
use sampler_core::supervisor::{TickOutcome, WorkerHealth};
use sampler_core::telemetry::{TelemetryPayload, TelemetryRecord};

use crate::sim::Event;

fn stamp(at: Timestamp) -> String {
    let millis = at.as_millis();
    format!("[{:>4}.{:03}s]", millis / 1_000, millis % 1_000)
}

fn health(health: WorkerHealth) -> StyledContent<&'static str> {
    match health {
        WorkerHealth::Healthy => "healthy".green(),
        WorkerHealth::SuspectedHung => "suspected-hung".yellow(),
        WorkerHealth::Unrecoverable => "unrecoverable".red().bold(),
    }
}

pub fn reset_reason(reason: ResetReason) -> String {
    match reason {
        ResetReason::WatchdogTimeout => {
            format!("{} previous reset caused by the watchdog", "boot".yellow())
        }
        ResetReason::Forced => format!("{} previous reset forced by software", "boot".cyan()),
        ResetReason::PowerOn => format!("{} power-on reset", "boot".cyan()),
    }
}

/// Returns `None` for events that are too noisy to print.
pub fn event(event: &Event, verbose: bool) -> Option<String> {
    match event {
        Event::HangInjected { at, generation } => Some(format!(
            "{} {} worker generation {generation} stops making progress",
            stamp(*at),
            "inject".magenta().bold()
        )),
        Event::Tick { at, outcome } => tick(*at, *outcome, verbose),
        Event::Telemetry(record) => Some(telemetry(record)),
        Event::Status(status) => Some(self::status(status)),
        Event::Reading { pin, value } => Some(format!("           read pin {:>3} = {value}", pin.0)),
        Event::WatchdogExpired { at } => Some(format!(
            "{} {} watchdog expired, chip resets",
            stamp(*at),
            "reset".red().bold()
        )),
    }
}

fn tick(at: Timestamp, outcome: TickOutcome, verbose: bool) -> Option<String> {
    match outcome {
        TickOutcome::Healthy if verbose => Some(format!("{} {}", stamp(at), "tick".dark_grey())),
        TickOutcome::Healthy => None,
        TickOutcome::Relaunched { attempt, stale_for } => Some(format!(
            "{} {} heartbeat stale for {:.1}s, relaunch attempt {attempt}",
            stamp(at),
            "tick".yellow(),
            stale_for.as_secs_f32()
        )),
        TickOutcome::Halted { first: true } => Some(format!(
            "{} {} restart budget exhausted, watchdog refresh withheld",
            stamp(at),
            "tick".red().bold()
        )),
        TickOutcome::Halted { first: false } if verbose => {
            Some(format!("{} {}", stamp(at), "tick (halted)".red()))
        }
        TickOutcome::Halted { first: false } => None,
    }
}

fn telemetry(record: &TelemetryRecord) -> String {
    let details = match record.details {
        TelemetryPayload::None => String::new(),
        TelemetryPayload::Hang(hang) => format!(
            " stale={}ms attempt={}",
            hang.stale_for.as_millis(),
            hang.attempt
        ),
        TelemetryPayload::Restarts(count) => format!(" restarts={count}"),
    };
    format!(
        "{} {} #{} {}{details}",
        stamp(record.timestamp),
        "event".cyan(),
        record.id,
        record.event
    )
}

fn status(status: &SamplerStatus) -> String {
    format!(
        "           status {} restarts={} heartbeat_age={}ms enabled={:#07b} averages={:?}",
        health(status.health),
        status.restart_count,
        status.heartbeat_age.as_millis(),
        status.enabled_mask,
        status.averages
    )
}
