//! Core ECS components shared by players, proxies and collectibles.
//!
//! Positions are plain `f32` world coordinates; there is no floating origin
//! in a single-arena game.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

/// World-space position of an entity.
#[derive(Component, Clone, Copy, Debug, PartialEq, Default)]
pub struct Position(pub Vec3);

/// Linear velocity in units per second.
#[derive(Component, Clone, Copy, Debug, PartialEq, Default)]
pub struct Velocity(pub Vec3);

/// Orientation as a unit quaternion.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Orientation(pub Quat);

impl Default for Orientation {
    fn default() -> Self {
        Self(Quat::IDENTITY)
    }
}

/// Whether the body reported floor contact on its last move.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Grounded(pub bool);

/// Directory name of an entity.
///
/// Entities registered through [`register_entity`](crate::register_entity)
/// carry the name they were registered under so the same name can be
/// removed on deregistration.
#[derive(Component, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Name(pub String);

impl Name {
    /// Creates a new [`Name`] from anything that converts to `String`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
