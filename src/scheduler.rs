//! Frame driving: one `tick(dt)` entry point, with the timing source owned by the host.
//!
//! Playback and seeking never overlap: a seek takes `&mut Simulation` for its
//! whole duration, pauses the transport, and starts from a cleared bar set.

use std::time::Instant;

use crate::sim::{SeekAnchor, SeekReport, Simulation};

/// Supplies elapsed seconds per frame; `None` ends a drive.
pub trait FrameSource {
    fn next_delta(&mut self) -> Option<f64>;
}

/// Real elapsed time between calls. The first call yields 0.
#[derive(Debug, Clone, Default)]
pub struct WallClock {
    last: Option<Instant>,
}

impl WallClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous frame time, e.g. after a pause.
    pub fn restart(&mut self) {
        self.last = None;
    }
}

impl FrameSource for WallClock {
    fn next_delta(&mut self) -> Option<f64> {
        let now = Instant::now();
        let dt = self
            .last
            .map(|prev| now.duration_since(prev).as_secs_f64())
            .unwrap_or(0.0);
        self.last = Some(now);
        Some(dt)
    }
}

/// A fixed number of identical steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedStep {
    pub dt: f64,
    pub remaining: u64,
}

impl FixedStep {
    pub fn new(dt: f64, frames: u64) -> Self {
        Self { dt, remaining: frames }
    }
}

impl FrameSource for FixedStep {
    fn next_delta(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.dt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    Playing,
    #[default]
    Paused,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    transport: Transport,
    frames: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }

    /// Frames advanced through `tick` or `step` since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn play(&mut self) {
        self.transport = Transport::Playing;
    }

    pub fn pause(&mut self) {
        self.transport = Transport::Paused;
    }

    pub fn toggle(&mut self) -> Transport {
        self.transport = match self.transport {
            Transport::Playing => Transport::Paused,
            Transport::Paused => Transport::Playing,
        };
        self.transport
    }

    /// Advance by `dt` if playing. Returns whether a frame was produced.
    pub fn tick(&mut self, sim: &mut Simulation, dt: f64) -> bool {
        if !self.is_playing() {
            return false;
        }
        sim.advance(dt);
        self.frames += 1;
        true
    }

    /// One fixed frame regardless of transport, for capture tooling.
    pub fn step(&mut self, sim: &mut Simulation) {
        sim.step_frame();
        self.frames += 1;
    }

    /// Tick until the source runs dry or playback is paused. Returns frames produced.
    pub fn drive<S: FrameSource>(&mut self, sim: &mut Simulation, source: &mut S) -> u64 {
        let mut produced = 0;
        while self.is_playing() {
            let Some(dt) = source.next_delta() else {
                break;
            };
            if self.tick(sim, dt) {
                produced += 1;
            }
        }
        produced
    }

    /// Pause playback and rebuild state for recording from `start_frame`.
    pub fn seek(
        &mut self,
        sim: &mut Simulation,
        start_frame: i64,
        pre_roll_frames: i64,
        anchor: &SeekAnchor,
    ) -> SeekReport {
        self.pause();
        sim.seek_to_frame(start_frame, pre_roll_frames, anchor)
    }
}
