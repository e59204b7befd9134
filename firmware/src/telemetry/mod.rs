//! Log output for supervisor telemetry.
//!
//! The supervisor only records structured events; this module turns them into
//! log lines. On target everything goes out over defmt/RTT, host builds print
//! the same lines to stdout.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use sampler_core::SamplerStatus;
use sampler_core::channels::AnalogPin;
use sampler_core::hal::ResetReason;
use sampler_core::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecord};

/// Log level a telemetry event is reported at.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[must_use]
pub const fn severity(event: TelemetryEventKind) -> Severity {
    match event {
        TelemetryEventKind::WorkerLaunched => Severity::Info,
        TelemetryEventKind::WatchdogResetObserved
        | TelemetryEventKind::HangDetected
        | TelemetryEventKind::WorkerRelaunched => Severity::Warn,
        TelemetryEventKind::RestartLimitReached => Severity::Error,
    }
}

/// Emits one line per supervisor event.
pub fn log_record(record: &TelemetryRecord) {
    emit_record(severity(record.event), record);
}

/// Announces a fresh worker from inside its entry point.
pub fn log_worker_started() {
    emit_worker_started();
}

pub fn log_reset_reason(reason: ResetReason) {
    emit_reset_reason(reason);
}

pub fn log_status(status: &SamplerStatus) {
    emit_status(status);
}

pub fn log_reading(pin: AnalogPin, value: u16) {
    emit_reading(pin, value);
}

#[cfg(target_os = "none")]
fn emit_record(severity: Severity, record: &TelemetryRecord) {
    match (severity, record.details) {
        (Severity::Error, details) => defmt::error!(
            "supervisor: {} {} t={}ms (watchdog refresh withheld)",
            record.event,
            details,
            record.timestamp.as_millis()
        ),
        (Severity::Warn, TelemetryPayload::Hang(hang)) => defmt::warn!(
            "supervisor: {} {} t={}ms",
            record.event,
            hang,
            record.timestamp.as_millis()
        ),
        (Severity::Warn, details) => defmt::warn!(
            "supervisor: {} {} t={}ms",
            record.event,
            details,
            record.timestamp.as_millis()
        ),
        (Severity::Info, _) => defmt::info!(
            "supervisor: {} t={}ms",
            record.event,
            record.timestamp.as_millis()
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(severity: Severity, record: &TelemetryRecord) {
    let level = match severity {
        Severity::Info => "INFO",
        Severity::Warn => "WARN",
        Severity::Error => "ERROR",
    };
    match record.details {
        TelemetryPayload::None => println!(
            "{level} supervisor: {} t={}ms",
            record.event,
            record.timestamp.as_millis()
        ),
        TelemetryPayload::Hang(hang) => println!(
            "{level} supervisor: {} stale {}ms attempt {} t={}ms",
            record.event,
            hang.stale_for.as_millis(),
            hang.attempt,
            record.timestamp.as_millis()
        ),
        TelemetryPayload::Restarts(count) => println!(
            "{level} supervisor: {} restarts={count} t={}ms",
            record.event,
            record.timestamp.as_millis()
        ),
    }
}

#[cfg(target_os = "none")]
fn emit_worker_started() {
    defmt::info!("acquisition worker started");
}

#[cfg(not(target_os = "none"))]
fn emit_worker_started() {
    println!("INFO acquisition worker started");
}

#[cfg(target_os = "none")]
fn emit_reset_reason(reason: ResetReason) {
    match reason {
        ResetReason::WatchdogTimeout => defmt::warn!("boot: reset caused by watchdog timeout"),
        other => defmt::info!("boot: reset reason {}", other),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_reset_reason(reason: ResetReason) {
    match reason {
        ResetReason::WatchdogTimeout => println!("WARN boot: reset caused by watchdog timeout"),
        other => println!("INFO boot: reset reason {other:?}"),
    }
}

#[cfg(target_os = "none")]
fn emit_status(status: &SamplerStatus) {
    defmt::info!("status: {}", status);
}

#[cfg(not(target_os = "none"))]
fn emit_status(status: &SamplerStatus) {
    println!(
        "INFO status: {:?} restarts={} age={}ms enabled={:#07b} averages={:?}",
        status.health,
        status.restart_count,
        status.heartbeat_age.as_millis(),
        status.enabled_mask,
        status.averages
    );
}

#[cfg(target_os = "none")]
fn emit_reading(pin: AnalogPin, value: u16) {
    defmt::info!("read: pin {} = {}", pin, value);
}

#[cfg(not(target_os = "none"))]
fn emit_reading(pin: AnalogPin, value: u16) {
    println!("INFO read: pin {} = {value}", pin.0);
}
