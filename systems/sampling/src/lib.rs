#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Sampler that captures one performance row per tick during the recording window.
//!
//! The window is checked after the tick's delta has been accumulated. The tick that
//! reaches the configured duration closes the window and contributes no row, so a run
//! whose recording lasts `n` valid ticks yields `n - 1` rows.

use log::{debug, trace};
use physics_stress_core::{ActivityQuery, BodyHandle, MemoryProbe, SampleRecord, BYTES_PER_MEGABYTE};

/// Outcome of feeding one tick to the [`Sampler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleOutcome {
    /// The tick produced a row.
    Recorded(SampleRecord),
    /// The tick delta was zero, negative or not finite and was ignored entirely.
    Skipped,
    /// The accumulated time reached the window length; no row was produced.
    WindowElapsed,
}

/// Bounded-duration sampler.
#[derive(Clone, Debug)]
pub struct Sampler {
    max_seconds: f32,
    elapsed_seconds: f32,
}

impl Sampler {
    /// Creates a sampler whose window lasts `max_seconds`.
    #[must_use]
    pub fn new(max_seconds: f32) -> Self {
        Self {
            max_seconds,
            elapsed_seconds: 0.0,
        }
    }

    /// Changes the window length used from the next [`Sampler::reset`] onwards.
    pub fn configure(&mut self, max_seconds: f32) {
        self.max_seconds = max_seconds;
    }

    /// Restarts the window timer.
    pub fn reset(&mut self) {
        self.elapsed_seconds = 0.0;
    }

    /// Seconds accumulated since the window opened.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed_seconds
    }

    /// Length of the window in seconds.
    #[must_use]
    pub fn max_seconds(&self) -> f32 {
        self.max_seconds
    }

    /// Feeds one tick to the sampler.
    ///
    /// `activity` is consulted once per handle and `memory` at most once per call.
    pub fn sample<A, M>(
        &mut self,
        delta_seconds: f32,
        target_count: u32,
        handles: &[BodyHandle],
        activity: &A,
        memory: &mut M,
    ) -> SampleOutcome
    where
        A: ActivityQuery + ?Sized,
        M: MemoryProbe + ?Sized,
    {
        if !is_usable_delta(delta_seconds) {
            return SampleOutcome::Skipped;
        }

        self.elapsed_seconds += delta_seconds;
        if self.elapsed_seconds >= self.max_seconds {
            debug!("recording window closed after {:.3}s", self.elapsed_seconds);
            return SampleOutcome::WindowElapsed;
        }

        let record = SampleRecord {
            elapsed_seconds: self.elapsed_seconds,
            target_count,
            frames_per_second: 1.0 / delta_seconds,
            frame_time_ms: delta_seconds * 1000.0,
            memory_used_mb: bytes_to_megabytes(memory.resident_bytes()),
            active_body_count: count_active(handles, activity),
        };
        trace!("sampled {record:?}");
        SampleOutcome::Recorded(record)
    }
}

/// Reports whether a tick delta can yield a frame rate.
#[must_use]
pub fn is_usable_delta(delta_seconds: f32) -> bool {
    delta_seconds.is_finite() && delta_seconds > 0.0
}

/// Converts a byte count into whole megabytes, rounding down.
#[must_use]
pub const fn bytes_to_megabytes(bytes: u64) -> u64 {
    bytes / BYTES_PER_MEGABYTE
}

/// Counts handles whose bodies are still dynamically simulated.
///
/// Handles that no longer resolve to a live body are ignored.
#[must_use]
pub fn count_active<A>(handles: &[BodyHandle], activity: &A) -> u32
where
    A: ActivityQuery + ?Sized,
{
    handles
        .iter()
        .filter(|handle| activity.is_active(**handle) == Some(true))
        .count() as u32
}
