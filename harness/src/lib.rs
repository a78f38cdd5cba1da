#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative test-run state for the physics stress harness.
//!
//! A [`Harness`] owns one test run at a time and moves it through
//! `Idle → Spawning → Recording → Complete`. Hosts drive it with two commands:
//! [`Command::StartTest`] (also the only way to cancel a run) and
//! [`Command::Tick`] once per frame. Everything runs synchronously inside the
//! caller's tick; the per-tick spawn budget keeps large populations from
//! stalling the frame.

use std::path::PathBuf;

use log::{info, warn};
use physics_stress_core::{
    ActivityQuery, BodyFactory, Command, Event, HarnessConfig, MemoryProbe, Phase, SessionHook,
};
use physics_stress_system_recording::{ensure_header, HeaderStatus, Recorder, RecorderError};
use physics_stress_system_sampling::{SampleOutcome, Sampler};
use physics_stress_system_spawning::{SpawnController, SpawnProgress};

/// Drives a single bounded stress test.
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    log_path: PathBuf,
    phase: Phase,
    spawner: SpawnController,
    sampler: Sampler,
    recorder: Recorder,
    flush_pending: bool,
}

impl Harness {
    /// Creates an idle harness.
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            log_path: config.log.path(),
            spawner: SpawnController::new(config.grid),
            sampler: Sampler::new(config.recording.max_seconds),
            recorder: Recorder::new(),
            phase: Phase::Idle,
            flush_pending: false,
            config,
        }
    }

    /// Prepares the host and makes sure the sample log carries its header.
    ///
    /// Call once per session, before the first test.
    pub fn begin_session(
        &mut self,
        hook: Option<&mut dyn SessionHook>,
    ) -> Result<HeaderStatus, RecorderError> {
        if let Some(hook) = hook {
            hook.prepare_session();
        }
        ensure_header(&self.log_path)
    }

    /// Discards the current run and starts spawning `target_count` bodies.
    ///
    /// Samples that were captured but never persisted are flushed first. If that flush
    /// fails the error is returned and the previous run is left exactly as it was.
    pub fn start_test<F>(
        &mut self,
        target_count: u32,
        factory: &mut F,
        out: &mut Vec<Event>,
    ) -> Result<(), RecorderError>
    where
        F: BodyFactory + ?Sized,
    {
        if self.phase == Phase::Recording || self.flush_pending {
            let _ = self.flush(out)?;
        }

        self.spawner.configure(target_count, factory);
        self.recorder.reset();
        self.sampler.configure(self.config.recording.max_seconds);
        self.sampler.reset();
        self.phase = Phase::Spawning;

        info!("starting test with {target_count} bodies");
        out.push(Event::TestStarted { target_count });
        Ok(())
    }

    /// Advances the run by one host frame.
    ///
    /// Only a failed flush at the end of the recording window produces an error; the
    /// rows stay buffered and [`Harness::retry_flush`] can persist them later.
    pub fn tick<W, M>(
        &mut self,
        delta_seconds: f32,
        world: &mut W,
        memory: &mut M,
        out: &mut Vec<Event>,
    ) -> Result<(), RecorderError>
    where
        W: BodyFactory + ActivityQuery + ?Sized,
        M: MemoryProbe + ?Sized,
    {
        match self.phase {
            Phase::Idle | Phase::Complete => Ok(()),
            Phase::Spawning => {
                self.spawn_batch(world, out);
                Ok(())
            }
            Phase::Recording => self.record(delta_seconds, &*world, memory, out),
        }
    }

    /// Persists rows whose flush previously failed. Does nothing when none are pending.
    pub fn retry_flush(&mut self, out: &mut Vec<Event>) -> Result<usize, RecorderError> {
        if !self.flush_pending {
            return Ok(0);
        }
        self.flush(out)
    }

    fn spawn_batch<F>(&mut self, factory: &mut F, out: &mut Vec<Event>)
    where
        F: BodyFactory + ?Sized,
    {
        let budget = self.config.grid.spawns_per_tick.max(1);
        if self.spawner.advance(budget, factory, out) == SpawnProgress::Pending {
            return;
        }

        let spawned = self.spawner.spawned_count();
        let target_count = self.spawner.target_count();
        if spawned < target_count {
            warn!("only {spawned} of {target_count} bodies could be spawned");
        }
        info!("spawned {spawned} bodies, recording for {}s", self.sampler.max_seconds());

        self.sampler.reset();
        self.phase = Phase::Recording;
        out.push(Event::SpawningCompleted {
            spawned,
            target_count,
        });
    }

    fn record<A, M>(
        &mut self,
        delta_seconds: f32,
        activity: &A,
        memory: &mut M,
        out: &mut Vec<Event>,
    ) -> Result<(), RecorderError>
    where
        A: ActivityQuery + ?Sized,
        M: MemoryProbe + ?Sized,
    {
        let outcome = self.sampler.sample(
            delta_seconds,
            self.spawner.target_count(),
            self.spawner.handles(),
            activity,
            memory,
        );

        match outcome {
            SampleOutcome::Recorded(record) => {
                self.recorder.append(record);
                out.push(Event::SampleRecorded { record });
                Ok(())
            }
            SampleOutcome::Skipped => {
                warn!("skipping sample for degenerate tick delta {delta_seconds}");
                out.push(Event::TickSkipped { delta_seconds });
                Ok(())
            }
            SampleOutcome::WindowElapsed => {
                let samples = self.recorder.len();
                info!("test complete after {samples} samples");
                self.phase = Phase::Complete;
                self.flush_pending = true;
                out.push(Event::RecordingCompleted { samples });
                let _ = self.flush(out)?;
                Ok(())
            }
        }
    }

    fn flush(&mut self, out: &mut Vec<Event>) -> Result<usize, RecorderError> {
        let rows = self.recorder.flush(&self.log_path)?;
        self.flush_pending = false;
        if rows > 0 {
            out.push(Event::LogFlushed {
                rows,
                path: self.log_path.clone(),
            });
        }
        Ok(rows)
    }
}

/// Applies a host command to the harness.
pub fn apply<W, M>(
    harness: &mut Harness,
    command: Command,
    world: &mut W,
    memory: &mut M,
    out_events: &mut Vec<Event>,
) -> Result<(), RecorderError>
where
    W: BodyFactory + ActivityQuery + ?Sized,
    M: MemoryProbe + ?Sized,
{
    match command {
        Command::StartTest { target_count } => harness.start_test(target_count, world, out_events),
        Command::Tick { delta_seconds } => harness.tick(delta_seconds, world, memory, out_events),
    }
}

/// Query functions that provide read-only access to the harness state.
pub mod query {
    use std::path::Path;

    use physics_stress_core::{BodyHandle, HarnessConfig, Phase, SampleRecord};

    use super::Harness;

    /// Current stage of the run.
    #[must_use]
    pub fn phase(harness: &Harness) -> Phase {
        harness.phase
    }

    /// Configuration the harness was built with.
    #[must_use]
    pub fn config(harness: &Harness) -> &HarnessConfig {
        &harness.config
    }

    /// Population requested for the current run.
    #[must_use]
    pub fn target_count(harness: &Harness) -> u32 {
        harness.spawner.target_count()
    }

    /// Spawn attempts made so far in the current run.
    #[must_use]
    pub fn spawn_cursor(harness: &Harness) -> u32 {
        harness.spawner.spawn_cursor()
    }

    /// Bodies successfully created in the current run.
    #[must_use]
    pub fn spawned_count(harness: &Harness) -> u32 {
        harness.spawner.spawned_count()
    }

    /// Handles of the bodies tracked for the current run.
    #[must_use]
    pub fn handles(harness: &Harness) -> &[BodyHandle] {
        harness.spawner.handles()
    }

    /// Seconds accumulated in the recording window.
    #[must_use]
    pub fn elapsed_recording_seconds(harness: &Harness) -> f32 {
        harness.sampler.elapsed_seconds()
    }

    /// Rows captured for the current run. They remain readable after the flush until
    /// the next run starts.
    #[must_use]
    pub fn records(harness: &Harness) -> &[SampleRecord] {
        harness.recorder.records()
    }

    /// Reports whether captured rows still await a successful flush.
    #[must_use]
    pub fn flush_pending(harness: &Harness) -> bool {
        harness.flush_pending
    }

    /// Path of the persisted sample log.
    #[must_use]
    pub fn log_path(harness: &Harness) -> &Path {
        &harness.log_path
    }
}
