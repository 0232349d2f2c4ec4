//! ECS world setup, core actor components, and the name → entity directory.
//!
//! Provides the [`World`](bevy_ecs::world::World) factory used by every game
//! node, the spatial components shared by players, proxies and collectibles,
//! and [`EntityDirectory`], the per-session registry that lets network code
//! address entities by their deterministic names.

mod components;
mod directory;
mod lifecycle;
mod time;
mod world;

pub use components::{Grounded, Name, Orientation, Position, Velocity};
pub use directory::EntityDirectory;
pub use lifecycle::{deregister_entity, despawn_entity, register_entity, spawn_entity};
pub use time::TimeRes;
pub use world::{create_world, register_core_resources};
