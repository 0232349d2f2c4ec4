//! First-person locomotion: the hierarchical locomotion state machine and the
//! controller host that feeds it per-frame input and applies its outputs to a
//! kinematic body.

pub mod controller;
pub mod locomotion;

pub use controller::{
    BodyMover, CrouchCollider, FlatFloor, KinematicBody, LedgeSensor, PlayerController,
    PlayerInputFrame, PlayerSave, should_jump,
};
pub use locomotion::{
    AnimationCue, GameOverReason, Input, Layer, LocomotionData, LocomotionEnv,
    LocomotionMachine, LocomotionSnapshot, Output, Settings, StateId, Step, global_input_vector,
};
