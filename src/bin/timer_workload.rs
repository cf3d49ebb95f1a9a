//! Deterministic timer workload runner for perf baselines.
#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::Parser;
use reactor_timers::{
    DeterministicClock, SchedulerConfig, TimerId, TimerKind, TimerScheduler,
    config::parse_max_timers,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy)]
enum Payload {
    OneShot,
    Periodic { remaining: u32 },
    Restartable,
}

type Sched = TimerScheduler<Payload, DeterministicClock>;

#[derive(Parser, Debug)]
#[command(name = "timer_workload")]
#[command(about = "Deterministic timer scheduler workload runner for perf baselines")]
struct Args {
    /// Timers armed per round.
    #[arg(long, default_value_t = 10_000)]
    timers: usize,
    /// Rounds of arm-and-drain.
    #[arg(long, default_value_t = 20)]
    rounds: usize,
    /// Every Nth timer is periodic (0 disables periodic timers).
    #[arg(long, default_value_t = 10)]
    periodic_every: usize,
    /// Firings before a periodic timer cancels itself.
    #[arg(long, default_value_t = 5)]
    periodic_runs: u32,
    /// Every Nth timer is cancelled right after arming (0 disables).
    #[arg(long, default_value_t = 7)]
    cancel_every: usize,
    /// Longest delay in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    max_delay_ms: u64,
    /// Loop step in milliseconds between ticks.
    #[arg(long, default_value_t = 4)]
    step_ms: u64,
    /// Outstanding timer cap (`unbounded` for none). Falls back to
    /// `REACTOR_TIMERS_MAX_TIMERS`, then the build default.
    #[arg(long)]
    max_timers: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = match args.max_timers.as_deref() {
        Some(raw) => SchedulerConfig {
            max_outstanding_timers: parse_max_timers(raw)?,
        },
        None => SchedulerConfig::from_env()?,
    };
    let mut sched: Sched = TimerScheduler::with_config(config, DeterministicClock::new(0))
        .context("building scheduler")?;

    let start = Instant::now();
    let mut armed = 0usize;
    let mut rejected = 0usize;
    let mut cancelled = 0usize;
    let mut restarted = 0usize;
    let mut fired = 0usize;
    let mut ticks = 0usize;
    let mut restartables = Vec::new();

    for round in 0..args.rounds {
        for i in 0..args.timers {
            let delay = Duration::from_millis(spread(round, i, args.max_delay_ms));
            let result = if args.periodic_every != 0 && i % args.periodic_every == 0 {
                let interval = delay.max(Duration::from_millis(1));
                sched.add_periodic_timer(
                    interval,
                    Payload::Periodic {
                        remaining: args.periodic_runs,
                    },
                )
            } else if i % 2 == 0 {
                sched.add_restartable_timer(delay, Payload::Restartable)
            } else {
                sched.add_timer(delay, Payload::OneShot)
            };

            match result {
                Ok(id) => {
                    armed += 1;
                    if args.cancel_every != 0 && i % args.cancel_every == 0 && sched.cancel(id) {
                        cancelled += 1;
                    } else if matches!(sched.kind(id), Some(TimerKind::Restartable { .. })) {
                        restartables.push(id);
                    }
                }
                Err(err) if err.is_capacity_exceeded() => rejected += 1,
                Err(err) => return Err(err).context("arming timer"),
            }
        }

        // Push back every other restartable timer once before it fires.
        restarted += restartables
            .iter()
            .step_by(2)
            .filter(|&&id| sched.restart(id))
            .count();

        while sched.next_deadline().is_some() {
            sched.clock().advance_ms(args.step_ms.max(1));
            fired += sched.tick_now(&mut dispatch);
            ticks += 1;
        }

        // Fired restartable timers stay registered until cancelled.
        for id in restartables.drain(..) {
            sched.cancel(id);
        }
    }

    let elapsed = start.elapsed();
    let elapsed_micros = elapsed.as_micros();
    let per_fire_ns = elapsed
        .as_nanos()
        .checked_div(fired as u128)
        .unwrap_or(0);

    let summary = json!({
        "schema": "reactor_timers.workload.v1",
        "rounds": args.rounds,
        "timers_per_round": args.timers,
        "armed": armed,
        "rejected": rejected,
        "cancelled": cancelled,
        "restarted": restarted,
        "fired": fired,
        "ticks": ticks,
        "elapsed_us": u64::try_from(elapsed_micros).unwrap_or(u64::MAX),
        "per_fire_ns": u64::try_from(per_fire_ns).unwrap_or(u64::MAX),
    });
    println!("{summary}");
    Ok(())
}

fn dispatch(id: TimerId, payload: &mut Payload, timers: &mut Sched) {
    match payload {
        Payload::Periodic { remaining } => {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                timers.cancel(id);
            }
        }
        Payload::OneShot | Payload::Restartable => {}
    }
}

/// Deterministic pseudo-random delay in `0..=max_ms`.
fn spread(round: usize, i: usize, max_ms: u64) -> u64 {
    let mut x = (round as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (i as u64);
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms.saturating_add(1)
}
