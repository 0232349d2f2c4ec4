//! Name → entity registry for one running game session.
//!
//! The directory is a plain map. It never removes entries by itself and does
//! not enforce uniqueness: inserting an existing name overwrites it, and the
//! component that registered a name is responsible for removing it.

use bevy_ecs::prelude::*;
use rustc_hash::FxHashMap;

/// Maps directory names (`"Player"`, `"Player_7"`, `"CollectorProxy_7"`, ...)
/// to entities.
#[derive(Resource, Debug, Default)]
pub struct EntityDirectory {
    entries: FxHashMap<String, Entity>,
}

impl EntityDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name`. Returns the entity previously stored
    /// under that name, if any.
    pub fn set(&mut self, name: impl Into<String>, entity: Entity) -> Option<Entity> {
        self.entries.insert(name.into(), entity)
    }

    /// The raw entity stored under `name`, without any capability check.
    pub fn entity(&self, name: &str) -> Option<Entity> {
        self.entries.get(name).copied()
    }

    /// Look up `name` and return its entity only if it is still alive and
    /// carries component `T`.
    pub fn get<T: Component>(&self, world: &World, name: &str) -> Option<Entity> {
        let entity = self.entity(name)?;
        let entity_ref = world.get_entity(entity).ok()?;
        entity_ref.contains::<T>().then_some(entity)
    }

    /// Look up `name` and borrow its `T` component.
    pub fn get_component<'w, T: Component>(&self, world: &'w World, name: &str) -> Option<&'w T> {
        let entity = self.entity(name)?;
        world.get::<T>(entity)
    }

    /// Remove `name`. Returns the entity it mapped to.
    pub fn remove(&mut self, name: &str) -> Option<Entity> {
        self.entries.remove(name)
    }

    /// Remove `name` only if it still maps to `entity`.
    ///
    /// Used on deactivation so an owner never removes a newer entry that
    /// overwrote its own.
    pub fn remove_if_owned(&mut self, name: &str, entity: Entity) -> bool {
        if self.entity(name) == Some(entity) {
            self.entries.remove(name);
            true
        } else {
            false
        }
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no names are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over registered names in arbitrary order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
