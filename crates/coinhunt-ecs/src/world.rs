//! World factory function and core resource registration.

use bevy_ecs::prelude::*;

use crate::{EntityDirectory, TimeRes};

/// Registers the core resources every game world needs.
pub fn register_core_resources(world: &mut World) {
    world.insert_resource(TimeRes::default());
    world.insert_resource(EntityDirectory::default());
}

/// Creates a world with [`TimeRes`] and an empty [`EntityDirectory`].
pub fn create_world() -> World {
    let mut world = World::new();
    register_core_resources(&mut world);
    world
}
