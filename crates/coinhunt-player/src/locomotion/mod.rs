//! Hierarchical locomotion state machine.
//!
//! The machine holds exactly one leaf [`StateId`]. An input is offered to the
//! leaf first and then to each ancestor layer in turn; the first layer that
//! declares the input decides the transition. Undeclared inputs are
//! self-transitions. Inputs raised while handling another input (floor and
//! movement edges from `moved`) are queued and processed after it, in order,
//! within the same call.
//!
//! The machine never touches the scene. Everything it needs from outside is
//! read through [`LocomotionEnv`], and everything it wants done is returned as
//! [`Output`]s in the [`Step`].

mod data;
mod handlers;
mod output;
mod settings;
mod state;

use std::collections::VecDeque;

use glam::{Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use data::LocomotionData;
pub use output::{AnimationCue, GameOverReason, Output};
pub use settings::Settings;
pub use state::{Layer, StateId};

use handlers::{Context, Transition};

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Read-only view of the actor's surroundings, supplied by the host on every
/// call.
pub trait LocomotionEnv {
    /// Camera orientation used to turn the raw move axis into world space.
    fn camera_basis(&self) -> Mat3;
    /// Raw move axis, each component in `[-1, 1]`. Negative y is forward.
    fn move_input(&self) -> Vec2;
    /// Current body velocity.
    fn velocity(&self) -> Vec3;
    /// Whether the body touched the floor during the last move.
    fn is_on_floor(&self) -> bool;
}

/// Map a raw move axis onto the ground plane in camera space. The square
/// input is first warped onto the unit disc so diagonals are not faster.
pub fn global_input_vector(camera_basis: Mat3, raw: Vec2) -> Vec3 {
    let input = Vec3::new(
        raw.x * (1.0 - raw.y * raw.y / 2.0).max(0.0).sqrt(),
        0.0,
        raw.y * (1.0 - raw.x * raw.x / 2.0).max(0.0).sqrt(),
    );
    let mut global = camera_basis * input;
    global.y = 0.0;
    global
}

// ---------------------------------------------------------------------------
// Inputs and steps
// ---------------------------------------------------------------------------

/// Everything the machine reacts to. The last five are raised internally by
/// `Moved` and are not normally sent by hosts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    Enable,
    Tick { delta: f32 },
    Moved { position: Vec3 },
    Jump { delta: f32 },
    Dash { direction: Vec3 },
    SprintStarted,
    SprintEnded,
    CrouchStarted,
    CrouchEnded,
    Pushed { impulse: Vec3 },
    Killed,
    CrouchEdgeBlockedChanged(bool),
    HitFloor { is_moving_horizontally: bool },
    LeftFloor { is_falling: bool },
    StartedFalling,
    StartedMovingHorizontally,
    StoppedMovingHorizontally,
}

/// Result of one call into the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Leaf active after the call.
    pub state: StateId,
    /// Outputs in emission order.
    pub outputs: Vec<Output>,
}

/// Persisted form of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocomotionSnapshot {
    pub state: StateId,
    pub data: LocomotionData,
}

// ---------------------------------------------------------------------------
// LocomotionMachine
// ---------------------------------------------------------------------------

/// Locomotion state machine for one actor.
#[derive(Debug, Clone)]
pub struct LocomotionMachine {
    state: StateId,
    data: LocomotionData,
    settings: Settings,
    queue: VecDeque<Input>,
}

impl LocomotionMachine {
    /// A disabled machine with default data.
    pub fn new(settings: Settings) -> Self {
        Self {
            state: StateId::Disabled,
            data: LocomotionData::default(),
            settings,
            queue: VecDeque::new(),
        }
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn data(&self) -> &LocomotionData {
        &self.data
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn enable(&mut self, env: &dyn LocomotionEnv) -> Step {
        self.input(env, Input::Enable)
    }

    pub fn tick(&mut self, env: &dyn LocomotionEnv, delta: f32) -> Step {
        self.input(env, Input::Tick { delta })
    }

    /// Report the body position after the host moved it.
    pub fn moved(&mut self, env: &dyn LocomotionEnv, position: Vec3) -> Step {
        self.input(env, Input::Moved { position })
    }

    pub fn jump_requested(&mut self, env: &dyn LocomotionEnv, delta: f32) -> Step {
        self.input(env, Input::Jump { delta })
    }

    pub fn dash_requested(&mut self, env: &dyn LocomotionEnv, direction: Vec3) -> Step {
        self.input(env, Input::Dash { direction })
    }

    /// Sprint press or release. A press is ignored while crouch is held.
    pub fn sprint_held(&mut self, env: &dyn LocomotionEnv, held: bool) -> Step {
        let input = if held {
            Input::SprintStarted
        } else {
            Input::SprintEnded
        };
        self.input(env, input)
    }

    /// Crouch press or release. A press ends sprint first.
    pub fn crouch_held(&mut self, env: &dyn LocomotionEnv, held: bool) -> Step {
        let input = if held {
            Input::CrouchStarted
        } else {
            Input::CrouchEnded
        };
        self.input(env, input)
    }

    pub fn pushed(&mut self, env: &dyn LocomotionEnv, impulse: Vec3) -> Step {
        self.input(env, Input::Pushed { impulse })
    }

    pub fn killed(&mut self, env: &dyn LocomotionEnv) -> Step {
        self.input(env, Input::Killed)
    }

    pub fn crouch_edge_blocked(&mut self, env: &dyn LocomotionEnv, blocked: bool) -> Step {
        self.input(env, Input::CrouchEdgeBlockedChanged(blocked))
    }

    /// Process `input` and everything it raises.
    pub fn input(&mut self, env: &dyn LocomotionEnv, input: Input) -> Step {
        let mut outputs = Vec::new();
        let mut velocity_override = None;
        self.queue.clear();

        match input {
            Input::SprintStarted if self.data.is_crouch_held => {
                trace!("sprint ignored while crouching");
                return self.step(outputs);
            }
            Input::CrouchStarted if self.data.is_sprint_held => {
                self.queue.push_back(Input::SprintEnded);
            }
            _ => {}
        }
        self.queue.push_back(input);

        while let Some(next) = self.queue.pop_front() {
            let mut ctx = Context {
                state: self.state,
                data: &mut self.data,
                settings: &self.settings,
                env,
                outputs: &mut outputs,
                raised: &mut self.queue,
                velocity_override: &mut velocity_override,
            };
            let Transition::To(target) = handlers::dispatch(&mut ctx, next) else {
                continue;
            };
            if target == self.state {
                continue;
            }

            let from = self.state;
            debug!(%from, to = %target, "locomotion state changed");
            ctx.outputs.push(Output::StateChanged { from, to: target });
            ctx.state = target;
            for layer in from.entered_layers(target) {
                handlers::enter(layer, &mut ctx);
            }
            self.state = target;
        }

        self.step(outputs)
    }

    /// Capture the active leaf and data.
    pub fn snapshot(&self) -> LocomotionSnapshot {
        LocomotionSnapshot {
            state: self.state,
            data: self.data,
        }
    }

    /// Adopt a snapshot. No enter hooks run and nothing is emitted.
    pub fn restore(&mut self, snapshot: LocomotionSnapshot) {
        self.state = snapshot.state;
        self.data = snapshot.data;
        self.queue.clear();
    }

    /// Reset data and return to `Disabled`.
    pub fn restart(&mut self) {
        self.state = StateId::Disabled;
        self.data = LocomotionData::default();
        self.queue.clear();
    }

    fn step(&self, outputs: Vec<Output>) -> Step {
        Step {
            state: self.state,
            outputs,
        }
    }
}
