#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the physics stress harness.
//!
//! This crate defines the message surface that connects hosts, the
//! authoritative test run, and the pure systems that drive it. Hosts submit
//! [`Command`] values (start a test, advance a tick), the harness executes
//! them and broadcasts [`Event`] values describing what happened. Everything
//! the harness needs from the outside world is expressed as a capability
//! trait: [`BodyFactory`] creates and destroys simulated bodies,
//! [`ActivityQuery`] reports whether a body is still being simulated, and
//! [`MemoryProbe`] reports resident memory.

use std::path::PathBuf;

use glam::{Quat, Vec3};
use serde::Deserialize;

/// Header row written once at the top of every persisted sample log.
pub const LOG_HEADER: &str = "Time,ObjectCount,FPS,FrameTime(ms),TotalMemory(MB),ActiveObjects";

/// Number of bytes in one megabyte as reported in the sample log.
pub const BYTES_PER_MEGABYTE: u64 = 1_048_576;

/// Stage of a test run's state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No test has been started yet.
    #[default]
    Idle,
    /// Bodies are being created a bounded batch per tick.
    Spawning,
    /// The population is static and one sample is captured per tick.
    Recording,
    /// The recording window elapsed and the samples were handed to the log.
    Complete,
}

/// Opaque reference to a simulated body owned by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(u64);

impl BodyHandle {
    /// Wraps a host-defined identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the host-defined identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Position and orientation handed to the body factory for a single spawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnPose {
    /// World-space position of the new body.
    pub position: Vec3,
    /// World-space orientation of the new body.
    pub rotation: Quat,
}

/// One immutable row of the sample log.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleRecord {
    /// Seconds elapsed since recording began, including this tick.
    pub elapsed_seconds: f32,
    /// Population requested for the run.
    pub target_count: u32,
    /// Instantaneous frame rate derived from the tick delta.
    pub frames_per_second: f32,
    /// Tick delta expressed in milliseconds.
    pub frame_time_ms: f32,
    /// Resident memory of the process in whole megabytes.
    pub memory_used_mb: u64,
    /// Number of tracked bodies the physics host still simulates.
    pub active_body_count: u32,
}

/// Commands that express every permissible mutation of a test run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Discards the previous run and starts spawning a new population.
    StartTest {
        /// Number of bodies to create.
        target_count: u32,
    },
    /// Advances the run by one host frame.
    Tick {
        /// Seconds elapsed since the previous frame.
        delta_seconds: f32,
    },
}

/// Events broadcast by the harness while processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A new run began spawning.
    TestStarted {
        /// Population requested for the run.
        target_count: u32,
    },
    /// A spawning tick finished its batch.
    BodiesSpawned {
        /// Spawn attempts made so far in the run.
        attempted: u32,
        /// Bodies successfully created so far in the run.
        spawned: u32,
    },
    /// The body factory declined to create the body at the given index.
    SpawnFailed {
        /// Zero-based grid index of the failed body.
        index: u32,
    },
    /// Every spawn attempt has been made and recording begins.
    SpawningCompleted {
        /// Bodies successfully created.
        spawned: u32,
        /// Population requested for the run.
        target_count: u32,
    },
    /// A sample row was appended to the in-memory buffer.
    SampleRecorded {
        /// Row captured for the tick.
        record: SampleRecord,
    },
    /// A recording tick carried a delta that cannot produce a sample.
    TickSkipped {
        /// The rejected delta.
        delta_seconds: f32,
    },
    /// The recording window elapsed.
    RecordingCompleted {
        /// Rows captured during the run.
        samples: usize,
    },
    /// Buffered rows were appended to the persisted log.
    LogFlushed {
        /// Rows written by the flush.
        rows: usize,
        /// Log file that received the rows.
        path: PathBuf,
    },
}

/// Capability that instantiates and destroys simulated bodies.
pub trait BodyFactory {
    /// Creates a body at the provided pose, returning `None` when the host declines.
    fn spawn(&mut self, pose: SpawnPose) -> Option<BodyHandle>;

    /// Destroys a previously spawned body. Unknown handles are ignored.
    fn destroy(&mut self, handle: BodyHandle);
}

/// Capability that reports whether a body is currently dynamically simulated.
pub trait ActivityQuery {
    /// Returns `Some(true)` for awake bodies, `Some(false)` for sleeping ones and
    /// `None` when the handle no longer resolves to a live body.
    fn is_active(&self, handle: BodyHandle) -> Option<bool>;
}

/// Capability that reports the resident memory of the running process.
pub trait MemoryProbe {
    /// Resident memory in bytes, or zero when it cannot be determined.
    fn resident_bytes(&mut self) -> u64;
}

/// Peripheral host configuration applied once when a session begins.
pub trait SessionHook {
    /// Prepares the host for measurement, e.g. by lifting frame-rate caps.
    fn prepare_session(&mut self);
}

/// Full configuration of the harness.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Placement and batching of spawned bodies.
    pub grid: GridLayout,
    /// Length of the sampling window.
    pub recording: RecordingConfig,
    /// Location of the persisted sample log.
    pub log: LogTarget,
}

/// Placement and batching parameters of the spawn controller.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridLayout {
    /// Maximum spawn attempts performed in one tick.
    pub spawns_per_tick: u32,
    /// Bodies placed per row before wrapping to the next row.
    pub columns: u32,
    /// Distance between neighbouring grid slots.
    pub spacing: f32,
    /// Height of the first row above the ground.
    pub elevation: f32,
    /// Magnitude of the uniform horizontal jitter applied per body.
    pub jitter: f32,
    /// Seed of the jitter generator.
    pub seed: u64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            spawns_per_tick: 20,
            columns: 10,
            spacing: 120.0,
            elevation: 500.0,
            jitter: 10.0,
            seed: 0x5eed_0f_b0d1e5,
        }
    }
}

/// Sampling window configuration.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordingConfig {
    /// Seconds of samples captured per run.
    pub max_seconds: f32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self { max_seconds: 20.0 }
    }
}

/// Directory and file name of the persisted sample log.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogTarget {
    /// Directory that holds the log file.
    pub directory: PathBuf,
    /// Name of the log file inside the directory.
    pub file_name: String,
}

impl LogTarget {
    /// Full path of the log file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

impl Default for LogTarget {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("Saved").join("Logs"),
            file_name: String::from("PhysicsData_Combined.csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [grid]
            spawns_per_tick = 10

            [log]
            file_name = "run.csv"
            "#,
        )
        .expect("config parses");

        assert_eq!(config.grid.spawns_per_tick, 10);
        assert_eq!(config.grid.columns, GridLayout::default().columns);
        assert_eq!(config.recording, RecordingConfig::default());
        assert_eq!(config.log.path(), PathBuf::from("Saved/Logs/run.csv"));
    }

    #[test]
    fn example_config_matches_defaults() {
        let config: HarnessConfig =
            toml::from_str(include_str!("../../config/harness.example.toml"))
                .expect("example config parses");
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: Result<HarnessConfig, _> = toml::from_str("[grid]\nrows = 4\n");
        assert!(parsed.is_err());
    }
}
