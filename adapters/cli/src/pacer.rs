use std::{
    thread,
    time::{Duration, Instant},
};

use log::info;
use physics_stress_core::SessionHook;

const VSYNC_INTERVAL: Duration = Duration::from_nanos(16_666_667);

/// Produces the delta of each host frame.
///
/// The pacer starts with a 60 Hz frame cap, the way a windowed host starts with vsync
/// enabled. Preparing a session lifts the cap unless it was explicitly requested.
#[derive(Debug)]
pub(crate) struct FramePacer {
    fixed_delta: Option<f32>,
    keep_vsync: bool,
    vsync: bool,
    last_frame: Instant,
}

impl FramePacer {
    pub(crate) fn new(fixed_delta: Option<f32>, keep_vsync: bool) -> Self {
        Self {
            fixed_delta,
            keep_vsync,
            vsync: true,
            last_frame: Instant::now(),
        }
    }

    /// Reports whether frames are capped at the vsync interval.
    pub(crate) fn vsync(&self) -> bool {
        self.vsync
    }

    /// Forgets time spent outside the frame loop.
    pub(crate) fn restart_clock(&mut self) {
        self.last_frame = Instant::now();
    }

    /// Waits for the next frame and returns the delta handed to the harness.
    pub(crate) fn next_frame(&mut self) -> f32 {
        if self.vsync {
            let deadline = self.last_frame + VSYNC_INTERVAL;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }

        let now = Instant::now();
        let measured = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.fixed_delta.unwrap_or(measured)
    }
}

impl SessionHook for FramePacer {
    fn prepare_session(&mut self) {
        self.vsync = self.keep_vsync;
        if !self.vsync {
            info!("frame cap disabled for measurement");
        }
        self.restart_clock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_lifts_frame_cap_by_default() {
        let mut pacer = FramePacer::new(None, false);
        assert!(pacer.vsync());

        pacer.prepare_session();

        assert!(!pacer.vsync());
    }

    #[test]
    fn requested_vsync_survives_session_setup() {
        let mut pacer = FramePacer::new(None, true);
        pacer.prepare_session();
        assert!(pacer.vsync());
    }

    #[test]
    fn fixed_delta_overrides_wall_clock() {
        let mut pacer = FramePacer::new(Some(0.125), false);
        pacer.prepare_session();
        assert_eq!(pacer.next_frame(), 0.125);
        assert_eq!(pacer.next_frame(), 0.125);
    }

    #[test]
    fn capped_frames_last_at_least_one_interval() {
        let mut pacer = FramePacer::new(None, true);
        pacer.restart_clock();
        let delta = pacer.next_frame();
        assert!(delta >= VSYNC_INTERVAL.as_secs_f32() * 0.99);
    }
}
