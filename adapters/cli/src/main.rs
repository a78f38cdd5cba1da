#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line host that runs physics stress tests against an in-process sandbox.

mod config;
mod pacer;
mod sandbox;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use physics_stress_core::{Event, Phase};
use physics_stress_harness::{query, Harness};
use physics_stress_sysinfo::SysinfoMemoryProbe;

use crate::{config::ConfigOverrides, pacer::FramePacer, sandbox::Sandbox};

/// Spawns bodies, samples frame metrics under load and appends them to a CSV log.
#[derive(Debug, Parser)]
#[command(name = "physics-stress", version)]
struct Args {
    /// Population of each test; repeat to run several tests back to back.
    #[arg(short = 'n', long = "count", required = true)]
    counts: Vec<u32>,
    /// TOML file with harness settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Maximum spawn attempts per frame.
    #[arg(long)]
    spawns_per_tick: Option<u32>,
    /// Length of the recording window in seconds.
    #[arg(long)]
    max_seconds: Option<f32>,
    /// Directory of the sample log.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// File name of the sample log.
    #[arg(long)]
    file_name: Option<String>,
    /// Seed of the placement jitter.
    #[arg(long)]
    seed: Option<u64>,
    /// Feed a constant frame delta instead of the measured wall-clock delta.
    #[arg(long)]
    fixed_dt: Option<f32>,
    /// Keep the 60 Hz frame cap during measurement.
    #[arg(long)]
    vsync: bool,
    /// Maximum number of live bodies the sandbox accepts.
    #[arg(long)]
    body_capacity: Option<usize>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            spawns_per_tick: self.spawns_per_tick,
            max_seconds: self.max_seconds,
            log_dir: self.log_dir.clone(),
            file_name: self.file_name.clone(),
            seed: self.seed,
        }
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = config::load(args.config.as_deref(), &args.overrides())?;
    config::validate_fixed_dt(args.fixed_dt)?;

    let mut harness = Harness::new(config);
    let mut sandbox = Sandbox::new(args.body_capacity);
    let mut memory = SysinfoMemoryProbe::new();
    let mut pacer = FramePacer::new(args.fixed_dt, args.vsync);
    let mut events = Vec::new();

    let _ = harness
        .begin_session(Some(&mut pacer))
        .context("failed to prepare the sample log")?;
    info!(
        "logging to {} (frame cap {})",
        query::log_path(&harness).display(),
        if pacer.vsync() { "on" } else { "off" }
    );

    for &count in &args.counts {
        harness
            .start_test(count, &mut sandbox, &mut events)
            .context("failed to persist the previous run")?;
        report(&mut events);
        pacer.restart_clock();

        while query::phase(&harness) != Phase::Complete {
            let delta_seconds = pacer.next_frame();
            sandbox.step(delta_seconds);
            if let Err(error) = harness.tick(delta_seconds, &mut sandbox, &mut memory, &mut events)
            {
                warn!("flush failed, retrying once: {error}");
                let _ = harness
                    .retry_flush(&mut events)
                    .context("failed to append samples to the log")?;
            }
            report(&mut events);
        }

        println!(
            "{count} bodies: {} spawned, {} samples, {} of {} asleep at the end",
            query::spawned_count(&harness),
            query::records(&harness).len(),
            sandbox.sleeping_count(),
            sandbox.live_count(),
        );
    }

    println!("samples appended to {}", query::log_path(&harness).display());
    Ok(())
}

fn report(events: &mut Vec<Event>) {
    for event in events.drain(..) {
        match event {
            Event::SpawningCompleted {
                spawned,
                target_count,
            } => info!("spawning finished: {spawned}/{target_count}"),
            Event::LogFlushed { rows, path } => {
                info!("flushed {rows} rows to {}", path.display());
            }
            other => debug!("{other:?}"),
        }
    }
}
