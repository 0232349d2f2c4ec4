use coinhunt_config::LocomotionConfig;
use serde::{Deserialize, Serialize};

/// Immutable locomotion tuning, built once from [`LocomotionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub stopping_speed: f32,
    pub gravity: f32,
    pub move_speed: f32,
    pub acceleration: f32,
    pub jump_impulse_force: f32,
    pub jump_force: f32,
    pub sprint_speed_multiplier: f32,
    pub crouch_speed_multiplier: f32,
    pub crouch_height_scale: f32,
    pub crouch_camera_offset: f32,
    pub crouch_ledge_check_distance: f32,
    pub crouch_ledge_vertical_tolerance: f32,
    pub dash_speed: f32,
    pub dash_duration: f32,
    pub dash_cooldown: f32,
}

impl From<&LocomotionConfig> for Settings {
    fn from(c: &LocomotionConfig) -> Self {
        Self {
            stopping_speed: c.stopping_speed,
            gravity: c.gravity,
            move_speed: c.move_speed,
            acceleration: c.acceleration,
            jump_impulse_force: c.jump_impulse_force,
            jump_force: c.jump_force,
            sprint_speed_multiplier: c.sprint_speed_multiplier,
            crouch_speed_multiplier: c.crouch_speed_multiplier,
            crouch_height_scale: c.crouch_height_scale,
            crouch_camera_offset: c.crouch_camera_offset,
            crouch_ledge_check_distance: c.crouch_ledge_check_distance,
            crouch_ledge_vertical_tolerance: c.crouch_ledge_vertical_tolerance,
            dash_speed: c.dash_speed,
            dash_duration: c.dash_duration,
            dash_cooldown: c.dash_cooldown,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&LocomotionConfig::default())
    }
}
