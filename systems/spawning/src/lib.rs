#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spawn controller that populates a test run a bounded batch per tick.

use glam::{Quat, Vec3};
use log::{debug, warn};
use physics_stress_core::{BodyFactory, BodyHandle, Event, GridLayout, SpawnPose};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Row and column a body index maps to on the spawn grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSlot {
    /// Zero-based row, growing upwards from the configured elevation.
    pub row: u32,
    /// Zero-based column, growing along the horizontal axis.
    pub column: u32,
}

impl GridSlot {
    /// Resolves the slot of the body at `index` for a grid with `columns` columns.
    ///
    /// A column count of zero is treated as a single column.
    #[must_use]
    pub const fn for_index(index: u32, columns: u32) -> Self {
        let columns = if columns == 0 { 1 } else { columns };
        Self {
            row: index / columns,
            column: index % columns,
        }
    }
}

/// Position of the body at `index` before any jitter is applied.
#[must_use]
pub fn grid_position(index: u32, layout: &GridLayout) -> Vec3 {
    let slot = GridSlot::for_index(index, layout.columns);
    Vec3::new(
        slot.column as f32 * layout.spacing,
        layout.elevation + slot.row as f32 * layout.spacing,
        0.0,
    )
}

/// Outcome of a single [`SpawnController::advance`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnProgress {
    /// Attempts remain for later ticks.
    Pending,
    /// Every attempt for the run has been made.
    Exhausted,
}

/// Incrementally creates the population of a test run.
#[derive(Debug)]
pub struct SpawnController {
    layout: GridLayout,
    target_count: u32,
    spawn_cursor: u32,
    handles: Vec<BodyHandle>,
    rng: ChaCha8Rng,
}

impl SpawnController {
    /// Creates an idle controller placing bodies according to `layout`.
    #[must_use]
    pub fn new(layout: GridLayout) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(layout.seed),
            layout,
            target_count: 0,
            spawn_cursor: 0,
            handles: Vec::new(),
        }
    }

    /// Destroys every tracked body and prepares to spawn `target_count` new ones.
    ///
    /// The jitter generator is reseeded so that identical runs place bodies identically.
    pub fn configure<F>(&mut self, target_count: u32, factory: &mut F)
    where
        F: BodyFactory + ?Sized,
    {
        let destroyed = self.handles.len();
        for handle in self.handles.drain(..) {
            factory.destroy(handle);
        }
        if destroyed > 0 {
            debug!("destroyed {destroyed} bodies from the previous run");
        }

        self.handles.reserve(target_count as usize);
        self.target_count = target_count;
        self.spawn_cursor = 0;
        self.rng = ChaCha8Rng::seed_from_u64(self.layout.seed);
    }

    /// Performs up to `budget` spawn attempts.
    ///
    /// A failed spawn is skipped but still consumes one unit of budget, so the number of
    /// ticks needed to exhaust the target never depends on how often the factory fails.
    pub fn advance<F>(
        &mut self,
        budget: u32,
        factory: &mut F,
        out: &mut Vec<Event>,
    ) -> SpawnProgress
    where
        F: BodyFactory + ?Sized,
    {
        let remaining = self.target_count.saturating_sub(self.spawn_cursor);
        let attempts = budget.min(remaining);

        for _ in 0..attempts {
            let index = self.spawn_cursor;
            let pose = self.pose_for(index);
            match factory.spawn(pose) {
                Some(handle) => self.handles.push(handle),
                None => {
                    warn!("body factory declined spawn #{index}; skipping");
                    out.push(Event::SpawnFailed { index });
                }
            }
            self.spawn_cursor += 1;
        }

        if attempts > 0 {
            out.push(Event::BodiesSpawned {
                attempted: self.spawn_cursor,
                spawned: self.spawned_count(),
            });
        }

        if self.is_exhausted() {
            SpawnProgress::Exhausted
        } else {
            SpawnProgress::Pending
        }
    }

    /// Reports whether every attempt for the run has been made.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.spawn_cursor >= self.target_count
    }

    /// Population requested for the current run.
    #[must_use]
    pub fn target_count(&self) -> u32 {
        self.target_count
    }

    /// Spawn attempts made so far, successful or not.
    #[must_use]
    pub fn spawn_cursor(&self) -> u32 {
        self.spawn_cursor
    }

    /// Bodies successfully created so far.
    #[must_use]
    pub fn spawned_count(&self) -> u32 {
        self.handles.len() as u32
    }

    /// Handles of every body created in the current run, in spawn order.
    #[must_use]
    pub fn handles(&self) -> &[BodyHandle] {
        &self.handles
    }

    fn pose_for(&mut self, index: u32) -> SpawnPose {
        let mut position = grid_position(index, &self.layout);
        position.x += self.next_jitter();
        SpawnPose {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Draws the horizontal offset of the next body. Magnitudes whose range cannot be
    /// sampled (non-finite, or wide enough to overflow) disable jitter.
    fn next_jitter(&mut self) -> f32 {
        let magnitude = self.layout.jitter.abs();
        if magnitude > 0.0 && (magnitude * 2.0).is_finite() {
            self.rng.gen_range(-magnitude..=magnitude)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_columns_collapse_to_single_column() {
        assert_eq!(GridSlot::for_index(7, 0), GridSlot { row: 7, column: 0 });
    }

    #[test]
    fn jitter_disabled_yields_exact_grid() {
        let layout = GridLayout {
            jitter: 0.0,
            ..GridLayout::default()
        };
        let mut controller = SpawnController::new(layout);
        let pose = controller.pose_for(13);
        assert_eq!(pose.position, grid_position(13, &layout));
        assert_eq!(pose.rotation, Quat::IDENTITY);
    }
}
