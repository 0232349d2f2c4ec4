//! Per-layer input handlers and enter hooks.
//!
//! A handler returns `None` when its layer does not declare the input, which
//! lets dispatch continue to the parent layer. `Some(Transition::Stay)` is a
//! declared no-op.

use std::collections::VecDeque;

use glam::{Vec2, Vec3};

use super::{
    AnimationCue, GameOverReason, Input, Layer, LocomotionData, LocomotionEnv, Output, Settings,
    StateId, global_input_vector,
};

/// Input length above which the direction counts as deliberate.
pub(crate) const MOVEMENT_THRESHOLD: f32 = 0.2;

const DIRECTION_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Stay,
    To(StateId),
}

/// Everything a handler may touch while processing one input.
pub(crate) struct Context<'a> {
    pub state: StateId,
    pub data: &'a mut LocomotionData,
    pub settings: &'a Settings,
    pub env: &'a dyn LocomotionEnv,
    pub outputs: &'a mut Vec<Output>,
    pub raised: &'a mut VecDeque<Input>,
    /// Velocity most recently handed to the host during this step. The host
    /// applies it before the next frame, so later inputs in the same step
    /// must see it instead of the stale body velocity.
    pub velocity_override: &'a mut Option<Vec3>,
}

impl Context<'_> {
    fn output(&mut self, output: Output) {
        match output {
            Output::VelocityChanged(v) | Output::MovementComputed { velocity: v, .. } => {
                *self.velocity_override = Some(v);
            }
            _ => {}
        }
        self.outputs.push(output);
    }

    fn raise(&mut self, input: Input) {
        self.raised.push_back(input);
    }

    fn velocity(&self) -> Vec3 {
        (*self.velocity_override).unwrap_or_else(|| self.env.velocity())
    }

    fn is_moving_horizontally(&self) -> bool {
        self.data.is_crouch_edge_blocked
            || planar(self.velocity()).length() > self.settings.stopping_speed
    }

    fn speed_multiplier(&self) -> f32 {
        if self.state.is_in(Layer::Sprinting) {
            self.settings.sprint_speed_multiplier
        } else if self.state.is_in(Layer::Crouching) {
            self.settings.crouch_speed_multiplier
        } else {
            1.0
        }
    }

    fn try_dash(&mut self, direction: Vec3) -> Transition {
        if self.data.try_start_dash(direction, self.settings) {
            Transition::To(StateId::Dashing)
        } else {
            Transition::Stay
        }
    }

    fn set_crouch(&mut self, held: bool) {
        self.data.is_crouch_held = held;
        self.data.camera_offset = if held {
            self.settings.crouch_camera_offset
        } else {
            0.0
        };
    }
}

fn planar(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

impl LocomotionData {
    /// Start a dash if both timers are idle and a direction can be found.
    /// Falls back to the last strong direction when `raw` is too short.
    pub fn try_start_dash(&mut self, raw: Vec3, settings: &Settings) -> bool {
        if self.dash_timer > 0.0 || self.dash_cooldown_timer > 0.0 {
            return false;
        }
        let mut direction = planar(raw);
        if direction.length_squared() <= DIRECTION_EPSILON {
            direction = planar(self.last_strong_direction);
        }
        if direction.length_squared() <= DIRECTION_EPSILON {
            return false;
        }
        let direction = direction.normalize();
        self.dash_direction = direction;
        self.last_strong_direction = direction;
        self.dash_timer = settings.dash_duration;
        self.dash_cooldown_timer = settings.dash_cooldown;
        true
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub(crate) fn dispatch(ctx: &mut Context<'_>, input: Input) -> Transition {
    for &layer in ctx.state.lineage() {
        if let Some(transition) = handle(layer, ctx, input) {
            return transition;
        }
    }
    Transition::Stay
}

fn handle(layer: Layer, ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match layer {
        Layer::Disabled => Some(match input {
            Input::Enable => Transition::To(StateId::Idle),
            _ => Transition::Stay,
        }),
        Layer::Dead => Some(Transition::Stay),
        Layer::Alive => alive(ctx, input),
        Layer::Grounded => grounded(ctx, input),
        Layer::Idle => idle(ctx, input),
        Layer::Moving => moving(ctx, input),
        Layer::Sprinting => sprinting(ctx, input),
        Layer::Crouching => crouching(ctx, input),
        Layer::CrouchIdle => match input {
            Input::StartedMovingHorizontally => Some(Transition::To(StateId::CrouchMoving)),
            _ => None,
        },
        Layer::CrouchMoving => match input {
            Input::StoppedMovingHorizontally => Some(Transition::To(StateId::CrouchIdle)),
            _ => None,
        },
        Layer::Dashing => dashing(ctx, input),
        Layer::Airborne => airborne(ctx, input),
        Layer::Jumping => match input {
            Input::Jump { delta } => {
                let mut velocity = ctx.velocity();
                velocity.y += ctx.settings.jump_force * delta;
                ctx.output(Output::VelocityChanged(velocity));
                Some(Transition::Stay)
            }
            _ => None,
        },
        Layer::Falling | Layer::Liftoff => None,
    }
}

/// Runs when `layer` becomes part of the active lineage.
pub(crate) fn enter(layer: Layer, ctx: &mut Context<'_>) {
    let cue = match layer {
        Layer::Idle | Layer::CrouchIdle => AnimationCue::Idle,
        Layer::Moving | Layer::CrouchMoving => AnimationCue::Move,
        Layer::Jumping => AnimationCue::Jump,
        Layer::Falling => AnimationCue::Fall,
        Layer::Liftoff => AnimationCue::Liftoff,
        Layer::Dashing => {
            let direction = ctx.data.dash_direction;
            if direction.length_squared() > DIRECTION_EPSILON {
                let mut velocity = ctx.velocity();
                velocity.x = direction.x * ctx.settings.dash_speed;
                velocity.z = direction.z * ctx.settings.dash_speed;
                ctx.output(Output::VelocityChanged(velocity));
            }
            return;
        }
        _ => return,
    };
    ctx.output(Output::Animation(cue));
}

// ---------------------------------------------------------------------------
// Alive
// ---------------------------------------------------------------------------

fn alive(ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match input {
        Input::Tick { delta } => alive_tick(ctx, delta),
        Input::Moved { position } => alive_moved(ctx, position),
        Input::Pushed { impulse } => {
            let velocity = ctx.velocity() + impulse;
            ctx.output(Output::VelocityChanged(velocity));
        }
        Input::SprintStarted => ctx.data.is_sprint_held = true,
        Input::SprintEnded => ctx.data.is_sprint_held = false,
        Input::CrouchStarted => ctx.data.is_crouch_held = true,
        Input::CrouchEnded => ctx.data.is_crouch_held = false,
        Input::CrouchEdgeBlockedChanged(blocked) => ctx.data.is_crouch_edge_blocked = blocked,
        Input::Dash { .. } => {}
        Input::Killed => {
            ctx.output(Output::GameOver(GameOverReason::Lost));
            return Some(Transition::To(StateId::Dead));
        }
        _ => return None,
    }
    Some(Transition::Stay)
}

fn alive_tick(ctx: &mut Context<'_>, delta: f32) {
    let move_direction = global_input_vector(ctx.env.camera_basis(), ctx.env.move_input());
    let direction = if move_direction.length() > MOVEMENT_THRESHOLD {
        ctx.data.last_strong_direction = move_direction.normalize();
        Vec2::new(move_direction.x, move_direction.z)
    } else {
        let last = ctx.data.last_strong_direction;
        Vec2::new(last.x, last.z)
    };

    ctx.data.dash_cooldown_timer = (ctx.data.dash_cooldown_timer - delta).max(0.0);

    ctx.data.last_velocity = ctx.velocity();
    let target = move_direction * ctx.settings.move_speed * ctx.speed_multiplier();
    let mut velocity = planar(ctx.data.last_velocity).lerp(target, ctx.settings.acceleration * delta);

    if move_direction.length() == 0.0 && velocity.length() < ctx.settings.stopping_speed {
        velocity = Vec3::ZERO;
    }
    velocity.y = ctx.data.last_velocity.y + ctx.settings.gravity * delta;

    ctx.output(Output::MovementComputed {
        velocity,
        planar_direction: direction,
        delta,
    });
}

fn alive_moved(ctx: &mut Context<'_>, position: Vec3) {
    ctx.output(Output::CameraTargetMoved(
        position + Vec3::Y * ctx.data.camera_offset,
    ));

    let velocity = ctx.velocity();
    let is_moving_horizontally = ctx.is_moving_horizontally();
    let is_on_floor = ctx.env.is_on_floor();
    let is_falling = velocity.y < 0.0;

    let data = &mut *ctx.data;
    let just_hit_floor = is_on_floor && !data.was_on_floor;
    let just_left_floor = !is_on_floor && data.was_on_floor;
    let just_started_falling = is_falling && data.last_velocity.y >= 0.0;
    let was_moving_horizontally = data.last_crouch_edge_blocked
        || planar(data.last_velocity).length() >= ctx.settings.stopping_speed;

    data.was_on_floor = is_on_floor;
    data.last_velocity = velocity;
    data.last_crouch_edge_blocked = data.is_crouch_edge_blocked;

    if just_hit_floor {
        ctx.raise(Input::HitFloor {
            is_moving_horizontally,
        });
    } else if just_left_floor {
        ctx.raise(Input::LeftFloor { is_falling });
    } else if just_started_falling {
        ctx.raise(Input::StartedFalling);
    }

    if is_moving_horizontally && !was_moving_horizontally {
        ctx.raise(Input::StartedMovingHorizontally);
    } else if !is_moving_horizontally && was_moving_horizontally {
        ctx.raise(Input::StoppedMovingHorizontally);
    }
}

// ---------------------------------------------------------------------------
// Grounded
// ---------------------------------------------------------------------------

fn grounded(ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match input {
        Input::Jump { .. } => {
            let mut velocity = ctx.velocity();
            velocity.y += ctx.settings.jump_impulse_force;
            ctx.output(Output::VelocityChanged(velocity));
            Some(Transition::To(StateId::Jumping))
        }
        Input::LeftFloor { is_falling } => Some(Transition::To(if is_falling {
            StateId::Falling
        } else {
            StateId::Liftoff
        })),
        _ => None,
    }
}

fn idle(ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match input {
        Input::StartedMovingHorizontally => Some(Transition::To(if ctx.data.is_sprint_held {
            StateId::Sprinting
        } else {
            StateId::Moving
        })),
        Input::CrouchStarted => {
            ctx.set_crouch(true);
            Some(Transition::To(StateId::CrouchIdle))
        }
        Input::Dash { direction } => Some(ctx.try_dash(direction)),
        _ => None,
    }
}

fn moving(ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match input {
        Input::StoppedMovingHorizontally => Some(Transition::To(StateId::Idle)),
        Input::SprintStarted => {
            ctx.data.is_sprint_held = true;
            Some(Transition::To(StateId::Sprinting))
        }
        Input::CrouchStarted => {
            ctx.set_crouch(true);
            Some(Transition::To(StateId::CrouchMoving))
        }
        Input::Dash { direction } => Some(ctx.try_dash(direction)),
        _ => None,
    }
}

fn sprinting(ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match input {
        Input::SprintEnded => {
            ctx.data.is_sprint_held = false;
            Some(Transition::To(if ctx.is_moving_horizontally() {
                StateId::Moving
            } else {
                StateId::Idle
            }))
        }
        _ => None,
    }
}

fn crouching(ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match input {
        Input::CrouchEnded => {
            ctx.set_crouch(false);
            Some(Transition::To(if !ctx.is_moving_horizontally() {
                StateId::Idle
            } else if ctx.data.is_sprint_held {
                StateId::Sprinting
            } else {
                StateId::Moving
            }))
        }
        Input::Dash { direction } => Some(ctx.try_dash(direction)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Dashing
// ---------------------------------------------------------------------------

fn dashing(ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match input {
        Input::Tick { delta } => Some(dashing_tick(ctx, delta)),
        Input::CrouchStarted => {
            ctx.set_crouch(true);
            Some(Transition::Stay)
        }
        Input::CrouchEnded => {
            ctx.set_crouch(false);
            Some(Transition::Stay)
        }
        Input::Dash { .. } => Some(Transition::Stay),
        _ => None,
    }
}

fn dashing_tick(ctx: &mut Context<'_>, delta: f32) -> Transition {
    let data = &mut *ctx.data;
    data.dash_cooldown_timer = (data.dash_cooldown_timer - delta).max(0.0);
    data.dash_timer = (data.dash_timer - delta).max(0.0);
    let direction = data.dash_direction;
    let finished = data.dash_timer <= 0.0;

    let mut velocity = ctx.velocity();
    velocity.y += ctx.settings.gravity * delta;
    velocity.x = direction.x * ctx.settings.dash_speed;
    velocity.z = direction.z * ctx.settings.dash_speed;
    ctx.output(Output::MovementComputed {
        velocity,
        planar_direction: Vec2::new(direction.x, direction.z),
        delta,
    });

    if finished {
        Transition::To(resolve_post_dash(ctx))
    } else {
        Transition::Stay
    }
}

fn resolve_post_dash(ctx: &Context<'_>) -> StateId {
    let moving = ctx.is_moving_horizontally();
    if !ctx.env.is_on_floor() {
        if ctx.velocity().y > 0.0 {
            StateId::Liftoff
        } else {
            StateId::Falling
        }
    } else if ctx.data.is_crouch_held {
        if moving {
            StateId::CrouchMoving
        } else {
            StateId::CrouchIdle
        }
    } else if moving {
        if ctx.data.is_sprint_held {
            StateId::Sprinting
        } else {
            StateId::Moving
        }
    } else {
        StateId::Idle
    }
}

// ---------------------------------------------------------------------------
// Airborne
// ---------------------------------------------------------------------------

fn airborne(ctx: &mut Context<'_>, input: Input) -> Option<Transition> {
    match input {
        Input::HitFloor {
            is_moving_horizontally,
        } => Some(Transition::To(if is_moving_horizontally {
            StateId::Moving
        } else {
            StateId::Idle
        })),
        Input::StartedFalling => Some(Transition::To(StateId::Falling)),
        Input::Dash { direction } => Some(ctx.try_dash(direction)),
        _ => None,
    }
}
