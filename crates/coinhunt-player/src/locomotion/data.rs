use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Mutable context shared by every locomotion state. Survives every
/// transition and is only reset by [`LocomotionMachine::restart`](super::LocomotionMachine::restart).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocomotionData {
    /// Floor contact as of the last `moved`.
    pub was_on_floor: bool,
    /// Sprint button is held.
    pub is_sprint_held: bool,
    /// Crouch button is held.
    pub is_crouch_held: bool,
    /// The crouch ledge guard is cancelling travel this frame.
    pub is_crouch_edge_blocked: bool,
    /// `is_crouch_edge_blocked` as of the last `moved`.
    pub last_crouch_edge_blocked: bool,
    /// Seconds left in the current dash.
    pub dash_timer: f32,
    /// Seconds until the next dash is allowed.
    pub dash_cooldown_timer: f32,
    /// Unit planar direction of the current dash.
    pub dash_direction: Vec3,
    /// Last input direction longer than the movement threshold.
    pub last_strong_direction: Vec3,
    /// Body velocity cached at the last tick or `moved`.
    pub last_velocity: Vec3,
    /// Vertical camera offset relative to the body.
    pub camera_offset: f32,
}

impl Default for LocomotionData {
    fn default() -> Self {
        Self {
            was_on_floor: true,
            is_sprint_held: false,
            is_crouch_held: false,
            is_crouch_edge_blocked: false,
            last_crouch_edge_blocked: false,
            dash_timer: 0.0,
            dash_cooldown_timer: 0.0,
            dash_direction: Vec3::ZERO,
            last_strong_direction: Vec3::NEG_Z,
            last_velocity: Vec3::ZERO,
            camera_offset: 0.0,
        }
    }
}
