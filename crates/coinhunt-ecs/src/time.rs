//! Time resource for the ECS world.

use bevy_ecs::prelude::*;

/// Simulation clock inserted into the ECS world at creation.
///
/// Advanced once per game tick, before any simulation runs.
#[derive(Resource, Debug, Clone, Default)]
pub struct TimeRes {
    /// Seconds simulated by the current tick.
    pub delta: f32,
    /// Total simulated seconds.
    pub elapsed: f64,
    /// Number of ticks advanced so far.
    pub tick: u64,
}

impl TimeRes {
    /// Advance the clock by one tick of `delta` seconds.
    pub fn advance(&mut self, delta: f32) {
        self.delta = delta;
        self.elapsed += f64::from(delta);
        self.tick += 1;
    }
}
