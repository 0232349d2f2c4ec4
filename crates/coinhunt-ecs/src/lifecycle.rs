//! Entity lifecycle utilities.
//!
//! [`spawn_entity`] and [`despawn_entity`] are thin wrappers over the world.
//! [`register_entity`] and [`deregister_entity`] pair spawning with directory
//! bookkeeping so the code that registers a name is also the code that
//! removes it.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::{EntityDirectory, Name};

/// Spawns an entity with the given component bundle and returns its Entity ID.
pub fn spawn_entity<B: Bundle>(world: &mut World, bundle: B) -> Entity {
    world.spawn(bundle).id()
}

/// Despawns an entity immediately. Returns `false` if the entity was already
/// despawned or never existed.
pub fn despawn_entity(world: &mut World, entity: Entity) -> bool {
    world.despawn(entity)
}

/// Spawn `bundle` with a [`Name`] and register it in the [`EntityDirectory`].
///
/// An existing entry under the same name is overwritten.
pub fn register_entity<B: Bundle>(world: &mut World, name: impl Into<String>, bundle: B) -> Entity {
    let name = name.into();
    let entity = world.spawn((Name::new(name.clone()), bundle)).id();
    if let Some(previous) = world.resource_mut::<EntityDirectory>().set(name.clone(), entity) {
        debug!(%name, ?previous, "directory entry overwritten");
    }
    entity
}

/// Remove an entity's directory entry (if it still owns it) and despawn it.
///
/// Returns `false` if the entity no longer exists.
pub fn deregister_entity(world: &mut World, entity: Entity) -> bool {
    let name = world.get::<Name>(entity).map(|n| n.0.clone());
    if let Some(name) = name {
        world
            .resource_mut::<EntityDirectory>()
            .remove_if_owned(&name, entity);
    }
    world.despawn(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, create_world};
    use glam::Vec3;

    #[derive(Component, Debug, PartialEq)]
    struct Health(u32);

    #[test]
    fn test_spawn_creates_entity_with_components() {
        let mut world = World::new();
        let entity = spawn_entity(&mut world, (Position(Vec3::new(10.0, 0.0, 0.0)), Health(100)));

        assert!(world.get_entity(entity).is_ok());
        assert_eq!(world.get::<Position>(entity).unwrap().0.x, 10.0);
        assert_eq!(world.get::<Health>(entity).unwrap().0, 100);
    }

    #[test]
    fn test_despawning_nonexistent_entity_is_safe() {
        let mut world = World::new();
        let entity = spawn_entity(&mut world, Position::default());
        assert!(despawn_entity(&mut world, entity));
        assert!(!despawn_entity(&mut world, entity));
    }

    #[test]
    fn test_register_adds_name_and_entry() {
        let mut world = create_world();
        let entity = register_entity(&mut world, "Player_5", Position(Vec3::Y));

        assert_eq!(world.get::<Name>(entity).unwrap().as_str(), "Player_5");
        let directory = world.resource::<EntityDirectory>();
        assert_eq!(directory.get::<Position>(&world, "Player_5"), Some(entity));
    }

    #[test]
    fn test_deregister_removes_entry_and_entity() {
        let mut world = create_world();
        let entity = register_entity(&mut world, "CollectorProxy_2", Position::default());

        assert!(deregister_entity(&mut world, entity));
        assert!(world.get_entity(entity).is_err());
        assert!(!world.resource::<EntityDirectory>().contains("CollectorProxy_2"));
        assert!(!deregister_entity(&mut world, entity));
    }

    #[test]
    fn test_deregister_leaves_overwriting_entry() {
        let mut world = create_world();
        let first = register_entity(&mut world, "Player", Position::default());
        let second = register_entity(&mut world, "Player", Position::default());

        deregister_entity(&mut world, first);
        assert_eq!(
            world.resource::<EntityDirectory>().entity("Player"),
            Some(second)
        );
    }
}
