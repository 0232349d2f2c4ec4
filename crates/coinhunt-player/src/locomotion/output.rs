//! Notifications the machine emits for its host.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::StateId;

/// Animation the host should play. The machine never plays anything itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationCue {
    Idle,
    Move,
    Jump,
    Fall,
    Liftoff,
}

/// Why the game ended for this actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOverReason {
    Lost,
}

/// One machine output, in emission order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Output {
    /// Overwrite the body velocity.
    VelocityChanged(Vec3),
    /// The desired velocity for this frame, before the crouch ledge guard.
    MovementComputed {
        /// Desired velocity.
        velocity: Vec3,
        /// Facing direction on the ground plane (x, z).
        planar_direction: Vec2,
        /// Frame delta in seconds.
        delta: f32,
    },
    /// Play an animation.
    Animation(AnimationCue),
    /// Where the camera should look from.
    CameraTargetMoved(Vec3),
    /// The active leaf changed.
    StateChanged {
        /// Previous leaf.
        from: StateId,
        /// New leaf.
        to: StateId,
    },
    /// The actor is out of the game.
    GameOver(GameOverReason),
}
