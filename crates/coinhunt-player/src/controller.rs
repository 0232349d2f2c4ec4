//! Player controller host: turns per-frame button state into locomotion
//! inputs, applies the machine's outputs to a kinematic body, and runs the
//! crouch ledge guard.
//!
//! Frame order for the authoritative participant:
//! 1. Sprint edge (start only while not crouching).
//! 2. Crouch edge (sprint forced off first, collider resized).
//! 3. Dash on just-pressed.
//! 4. Tick.
//! 5. Jump while pressed or just-pressed.
//! 6. External body mover.
//! 7. `moved` with the new position.
//!
//! Non-authoritative controllers do none of this; their body is overwritten
//! from the network.

use std::collections::VecDeque;

use glam::{Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::locomotion::{
    AnimationCue, GameOverReason, LocomotionEnv, LocomotionMachine, LocomotionSnapshot, Output,
    Settings, StateId, Step, global_input_vector,
};

const GUARD_EPSILON: f32 = 1e-6;
/// Height above the body the ledge check starts from.
const SENSE_LIFT: f32 = 0.1;

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Kinematic body state owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KinematicBody {
    pub position: Vec3,
    pub velocity: Vec3,
    pub on_floor: bool,
}

/// Displaces the body by its velocity, resolving collisions.
pub trait BodyMover {
    fn move_and_slide(&mut self, body: &mut KinematicBody, delta: f32);
}

/// Answers whether there is floor between two points of a vertical segment.
pub trait LedgeSensor {
    fn has_support(&self, start: Vec3, end: Vec3) -> bool;
}

/// A horizontal floor at `height`, optionally bounded to a square of
/// `half_extent` around the origin. Stands in for a physics scene in headless
/// runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatFloor {
    pub height: f32,
    pub half_extent: Option<f32>,
}

impl Default for FlatFloor {
    fn default() -> Self {
        Self {
            height: 0.0,
            half_extent: None,
        }
    }
}

impl FlatFloor {
    fn covers(&self, point: Vec3) -> bool {
        self.half_extent
            .is_none_or(|h| point.x.abs() <= h && point.z.abs() <= h)
    }
}

impl BodyMover for FlatFloor {
    fn move_and_slide(&mut self, body: &mut KinematicBody, delta: f32) {
        body.position += body.velocity * delta;
        body.on_floor = false;
        if self.covers(body.position) && body.position.y <= self.height {
            body.position.y = self.height;
            body.velocity.y = body.velocity.y.max(0.0);
            body.on_floor = true;
        }
    }
}

impl LedgeSensor for FlatFloor {
    fn has_support(&self, start: Vec3, end: Vec3) -> bool {
        let (low, high) = (start.y.min(end.y), start.y.max(end.y));
        self.covers(end) && low <= self.height && self.height <= high
    }
}

// ---------------------------------------------------------------------------
// Collider
// ---------------------------------------------------------------------------

/// Capsule collider dimensions, standing and current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrouchCollider {
    pub standing_height: f32,
    pub standing_offset: f32,
    pub height: f32,
    pub offset: f32,
}

impl CrouchCollider {
    pub fn new(standing_height: f32, standing_offset: f32) -> Self {
        Self {
            standing_height,
            standing_offset,
            height: standing_height,
            offset: standing_offset,
        }
    }

    /// Scale the capsule for crouching, keeping its base on the floor.
    pub fn apply(&mut self, crouched: bool, height_scale: f32) {
        if crouched {
            self.height = self.standing_height * height_scale.clamp(0.1, 1.0);
            self.offset = self.standing_offset - (self.standing_height - self.height) / 2.0;
        } else {
            self.height = self.standing_height;
            self.offset = self.standing_offset;
        }
    }
}

impl Default for CrouchCollider {
    fn default() -> Self {
        Self::new(2.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Input frame
// ---------------------------------------------------------------------------

/// Button and axis state sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerInputFrame {
    pub delta: f32,
    pub move_axis: Vec2,
    pub camera_basis: Mat3,
    pub jump_pressed: bool,
    pub jump_just_pressed: bool,
    pub sprint_pressed: bool,
    pub crouch_pressed: bool,
    pub dash_just_pressed: bool,
}

impl Default for PlayerInputFrame {
    fn default() -> Self {
        Self {
            delta: 0.0,
            move_axis: Vec2::ZERO,
            camera_basis: Mat3::IDENTITY,
            jump_pressed: false,
            jump_just_pressed: false,
            sprint_pressed: false,
            crouch_pressed: false,
            dash_just_pressed: false,
        }
    }
}

/// Jump fires on the press edge and keeps firing while held.
pub fn should_jump(pressed: bool, just_pressed: bool) -> bool {
    pressed || just_pressed
}

struct FrameEnv {
    camera_basis: Mat3,
    move_axis: Vec2,
    velocity: Vec3,
    on_floor: bool,
}

impl LocomotionEnv for FrameEnv {
    fn camera_basis(&self) -> Mat3 {
        self.camera_basis
    }
    fn move_input(&self) -> Vec2 {
        self.move_axis
    }
    fn velocity(&self) -> Vec3 {
        self.velocity
    }
    fn is_on_floor(&self) -> bool {
        self.on_floor
    }
}

// ---------------------------------------------------------------------------
// Save data
// ---------------------------------------------------------------------------

/// Everything needed to put a player back where it was.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSave {
    pub position: Vec3,
    pub velocity: Vec3,
    pub locomotion: LocomotionSnapshot,
}

// ---------------------------------------------------------------------------
// PlayerController
// ---------------------------------------------------------------------------

/// Hosts one [`LocomotionMachine`] and the body it drives.
#[derive(Debug, Clone)]
pub struct PlayerController {
    machine: LocomotionMachine,
    body: KinematicBody,
    collider: CrouchCollider,
    has_authority: bool,
    is_sprinting: bool,
    is_crouching: bool,
    is_crouch_edge_blocked: bool,
    camera_target: Vec3,
    animation: Option<AnimationCue>,
    game_over: Option<GameOverReason>,
    frame: PlayerInputFrame,
}

impl PlayerController {
    /// An enabled controller standing at `position`, without authority.
    pub fn new(settings: Settings, position: Vec3) -> Self {
        let mut controller = Self {
            machine: LocomotionMachine::new(settings),
            body: KinematicBody {
                position,
                velocity: Vec3::ZERO,
                on_floor: true,
            },
            collider: CrouchCollider::default(),
            has_authority: false,
            is_sprinting: false,
            is_crouching: false,
            is_crouch_edge_blocked: false,
            camera_target: position,
            animation: None,
            game_over: None,
            frame: PlayerInputFrame::default(),
        };
        let env = controller.env();
        let step = controller.machine.enable(&env);
        controller.apply(step, None);
        controller
    }

    pub fn has_authority(&self) -> bool {
        self.has_authority
    }

    pub fn set_authority(&mut self, has_authority: bool) {
        if self.has_authority != has_authority {
            debug!(has_authority, "player authority changed");
        }
        self.has_authority = has_authority;
    }

    pub fn state(&self) -> StateId {
        self.machine.state()
    }

    pub fn machine(&self) -> &LocomotionMachine {
        &self.machine
    }

    pub fn body(&self) -> &KinematicBody {
        &self.body
    }

    pub fn position(&self) -> Vec3 {
        self.body.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.body.velocity
    }

    pub fn collider(&self) -> &CrouchCollider {
        &self.collider
    }

    pub fn camera_target(&self) -> Vec3 {
        self.camera_target
    }

    /// Last animation cue the machine asked for.
    pub fn animation(&self) -> Option<AnimationCue> {
        self.animation
    }

    pub fn game_over(&self) -> Option<GameOverReason> {
        self.game_over
    }

    /// Point a collected item flies toward.
    pub fn center_of_mass(&self) -> Vec3 {
        self.body.position + Vec3::Y
    }

    pub fn is_crouch_edge_blocked(&self) -> bool {
        self.is_crouch_edge_blocked
    }

    pub fn is_moving_horizontally(&self) -> bool {
        let planar = Vec3::new(self.body.velocity.x, 0.0, self.body.velocity.z);
        self.is_crouch_edge_blocked || planar.length() > self.machine.settings().stopping_speed
    }

    /// Overwrite the body from an authoritative remote state.
    pub fn apply_network_state(&mut self, position: Vec3, velocity: Vec3) {
        self.body.position = position;
        self.body.velocity = velocity;
    }

    /// Place the body at `position` at rest.
    pub fn teleport(&mut self, position: Vec3) {
        self.body.position = position;
        self.body.velocity = Vec3::ZERO;
        self.camera_target = position;
    }

    /// Run one frame. Does nothing without authority.
    pub fn update(
        &mut self,
        frame: PlayerInputFrame,
        mover: &mut dyn BodyMover,
        sensor: &dyn LedgeSensor,
    ) {
        if !self.has_authority {
            return;
        }
        self.frame = frame;

        self.handle_sprint(frame.sprint_pressed, sensor);
        self.handle_crouch(frame.crouch_pressed, sensor);

        if frame.dash_just_pressed {
            let direction = global_input_vector(frame.camera_basis, frame.move_axis);
            let env = self.env();
            let step = self.machine.dash_requested(&env, direction);
            self.apply(step, Some(sensor));
        }

        let env = self.env();

        let step = self.machine.tick(&env, frame.delta);
        self.apply(step, Some(sensor));

        if should_jump(frame.jump_pressed, frame.jump_just_pressed) {
            let env = self.env();
            let step = self.machine.jump_requested(&env, frame.delta);
            self.apply(step, Some(sensor));
        }

        mover.move_and_slide(&mut self.body, frame.delta);

        let env = self.env();

        let step = self.machine.moved(&env, self.body.position);
        self.apply(step, Some(sensor));
    }

    /// Add an external impulse.
    pub fn push(&mut self, impulse: Vec3) {
        let env = self.env();
        let step = self.machine.pushed(&env, impulse);
        self.apply(step, None);
    }

    pub fn kill(&mut self) {
        let env = self.env();
        let step = self.machine.killed(&env);
        self.apply(step, None);
    }

    pub fn save(&self) -> PlayerSave {
        PlayerSave {
            position: self.body.position,
            velocity: self.body.velocity,
            locomotion: self.machine.snapshot(),
        }
    }

    pub fn load(&mut self, save: PlayerSave) {
        self.body.position = save.position;
        self.body.velocity = save.velocity;
        self.machine.restore(save.locomotion);
        let data = self.machine.data();
        self.is_sprinting = data.is_sprint_held;
        self.is_crouching = data.is_crouch_held;
        self.is_crouch_edge_blocked = data.is_crouch_edge_blocked;
        let scale = self.machine.settings().crouch_height_scale;
        self.collider.apply(self.is_crouching, scale);
    }

    fn env(&self) -> FrameEnv {
        FrameEnv {
            camera_basis: self.frame.camera_basis,
            move_axis: self.frame.move_axis,
            velocity: self.body.velocity,
            on_floor: self.body.on_floor,
        }
    }

    fn handle_sprint(&mut self, pressed: bool, sensor: &dyn LedgeSensor) {
        if pressed && !self.is_crouching {
            if !self.is_sprinting {
                self.is_sprinting = true;
                let env = self.env();
                let step = self.machine.sprint_held(&env, true);
                self.apply(step, Some(sensor));
            }
        } else if self.is_sprinting {
            self.is_sprinting = false;
            let env = self.env();
            let step = self.machine.sprint_held(&env, false);
            self.apply(step, Some(sensor));
        }
    }

    fn handle_crouch(&mut self, pressed: bool, sensor: &dyn LedgeSensor) {
        let scale = self.machine.settings().crouch_height_scale;
        if pressed && !self.is_crouching {
            self.is_crouching = true;
            self.set_crouch_edge_blocked(false, Some(sensor));
            // The machine ends sprint itself before crouching.
            self.is_sprinting = false;
            self.collider.apply(true, scale);
            let env = self.env();
            let step = self.machine.crouch_held(&env, true);
            self.apply(step, Some(sensor));
        } else if !pressed && self.is_crouching {
            self.is_crouching = false;
            self.collider.apply(false, scale);
            self.set_crouch_edge_blocked(false, Some(sensor));
            let env = self.env();
            let step = self.machine.crouch_held(&env, false);
            self.apply(step, Some(sensor));
        }
    }

    fn set_crouch_edge_blocked(&mut self, blocked: bool, sensor: Option<&dyn LedgeSensor>) {
        if self.is_crouch_edge_blocked == blocked {
            return;
        }
        self.is_crouch_edge_blocked = blocked;
        let env = self.env();
        let step = self.machine.crouch_edge_blocked(&env, blocked);
        self.apply(step, sensor);
    }

    fn apply(&mut self, step: Step, sensor: Option<&dyn LedgeSensor>) {
        let mut pending: VecDeque<Output> = step.outputs.into();
        while let Some(output) = pending.pop_front() {
            match output {
                Output::VelocityChanged(velocity) => {
                    self.set_crouch_edge_blocked(false, sensor);
                    self.body.velocity = velocity;
                }
                Output::MovementComputed {
                    velocity, delta, ..
                } => {
                    let (velocity, blocked) = match sensor {
                        Some(sensor) => self.crouch_edge_guard(velocity, delta, sensor),
                        None => (velocity, false),
                    };
                    self.body.velocity = velocity;
                    self.set_crouch_edge_blocked(blocked, sensor);
                }
                Output::Animation(cue) => self.animation = Some(cue),
                Output::CameraTargetMoved(target) => self.camera_target = target,
                Output::StateChanged { .. } => {}
                Output::GameOver(reason) => {
                    info!(?reason, "player is out");
                    self.game_over = Some(reason);
                }
            }
        }
    }

    /// Cancel travel toward a drop while crouching. Returns the adjusted
    /// velocity and whether any travel was cancelled.
    fn crouch_edge_guard(&self, velocity: Vec3, delta: f32, sensor: &dyn LedgeSensor) -> (Vec3, bool) {
        let planar = Vec3::new(velocity.x, 0.0, velocity.z);
        if !self.is_crouching
            || !self.body.on_floor
            || delta <= GUARD_EPSILON
            || planar.length_squared() <= GUARD_EPSILON
        {
            return (velocity, false);
        }

        let settings = self.machine.settings();
        let displacement = planar * delta;
        let direction = displacement.normalize();
        let reach = settings
            .crouch_ledge_check_distance
            .max(0.0)
            .min(displacement.length());
        let start = self.body.position + direction * reach + Vec3::Y * SENSE_LIFT;
        let end = start - Vec3::Y * (settings.crouch_ledge_vertical_tolerance.max(0.0) + SENSE_LIFT);

        if sensor.has_support(start, end) {
            return (velocity, false);
        }

        let along = direction * velocity.dot(direction);
        (velocity - along, along.length_squared() > GUARD_EPSILON)
    }
}
