mod render;
mod sim;

use std::env;
use std::io::{self, Write};
use std::process;
use std::time::Duration;

use sampler_core::channels::AnalogPin;
use sampler_core::hal::ResetReason;
use sampler_core::supervisor::{SupervisorConfig, WatchdogTimeout};

use sim::{Plan, World};

const USAGE: &str = "Usage: sampler-emulator [--scale <n>] [--duration <secs>] \
[--hang-at <secs>]... [--persistent-hang] [--long-watchdog] [--after-watchdog-reset] [--verbose]";

const DEFAULT_SCALE: u32 = 20;
const DEFAULT_DURATION: Duration = Duration::from_secs(120);

const SCANNED_PINS: [AnalogPin; 5] = [
    AnalogPin::A0,
    AnalogPin::A1,
    AnalogPin::A2,
    AnalogPin::A3,
    AnalogPin::MCU_TEMP,
];

#[derive(Debug)]
struct Options {
    scale: u32,
    plan: Plan,
    watchdog: WatchdogTimeout,
    reset_reason: ResetReason,
    verbose: bool,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let world = World::new(options.scale, &SCANNED_PINS).map_err(io::Error::other)?;
    let mut supervisor = world
        .supervisor(
            SupervisorConfig::new(options.watchdog),
            options.reset_reason,
        )
        .map_err(io::Error::other)?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    writeln!(
        writer,
        "Sampler emulator: {}x time, watchdog {}s, hang threshold {}s.",
        options.scale,
        supervisor.config().watchdog_timeout.as_secs(),
        supervisor.config().hang_threshold.as_secs()
    )?;

    let reason = supervisor.start();
    writeln!(writer, "{}", render::reset_reason(reason))?;
    for record in supervisor.telemetry().oldest_first() {
        writeln!(
            writer,
            "{}",
            render::event(&sim::Event::Telemetry(*record), options.verbose).unwrap_or_default()
        )?;
    }

    let mut failed = None;
    let summary = sim::run(
        &world,
        &mut supervisor,
        &options.plan,
        &SCANNED_PINS,
        |event| {
            if failed.is_some() {
                return;
            }
            if let Some(line) = render::event(event, options.verbose) {
                if let Err(err) = writeln!(writer, "{line}") {
                    failed = Some(err);
                }
            }
        },
    );
    if let Some(err) = failed {
        return Err(err);
    }

    writeln!(
        writer,
        "Finished after {} ticks: {} restarts, LED pulses {}, toggles {}{}.",
        summary.ticks,
        summary.status.restart_count,
        world.led.pulses(),
        world.led.toggles(),
        if summary.watchdog_expired {
            ", chip reset by watchdog"
        } else {
            ""
        }
    )?;
    Ok(())
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        scale: DEFAULT_SCALE,
        plan: Plan {
            duration: DEFAULT_DURATION,
            ..Plan::default()
        },
        watchdog: WatchdogTimeout::default(),
        reset_reason: ResetReason::PowerOn,
        verbose: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--scale" => options.scale = parse_number(&arg, args.next())?,
            "--duration" => {
                options.plan.duration = Duration::from_secs(parse_number(&arg, args.next())?);
            }
            "--hang-at" => {
                let at = Duration::from_secs(parse_number(&arg, args.next())?);
                options.plan.hang_at.push(at);
            }
            "--persistent-hang" => options.plan.persistent = true,
            "--long-watchdog" => options.watchdog = WatchdogTimeout::Long,
            "--after-watchdog-reset" => options.reset_reason = ResetReason::WatchdogTimeout,
            "--verbose" | "-v" => options.verbose = true,
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    if options.scale == 0 {
        return Err("--scale must be at least 1".to_string());
    }
    Ok(options)
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("Expected value after {flag}"))?;
    value
        .parse()
        .map_err(|_| format!("Invalid value `{value}` for {flag}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, String> {
        parse_options(args.iter().map(ToString::to_string))
    }

    #[test]
    fn defaults_run_without_hangs() {
        let options = parse(&[]).expect("defaults parse");
        assert_eq!(options.scale, DEFAULT_SCALE);
        assert!(options.plan.hang_at.is_empty());
        assert_eq!(options.watchdog, WatchdogTimeout::Short);
        assert_eq!(options.reset_reason, ResetReason::PowerOn);
    }

    #[test]
    fn hang_flags_accumulate() {
        let options = parse(&["--hang-at", "20", "--hang-at", "60", "--persistent-hang"])
            .expect("valid flags");
        assert_eq!(
            options.plan.hang_at,
            [Duration::from_secs(20), Duration::from_secs(60)]
        );
        assert!(options.plan.persistent);
    }

    #[test]
    fn rejects_missing_and_bad_values() {
        assert!(parse(&["--scale"]).is_err());
        assert!(parse(&["--scale", "fast"]).is_err());
        assert!(parse(&["--scale", "0"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
