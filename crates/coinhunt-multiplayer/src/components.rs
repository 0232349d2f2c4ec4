//! Components attached to networked actors and collectibles.

use bevy_ecs::prelude::*;
use coinhunt_net::PeerId;
use glam::Vec3;

/// The peer allowed to originate this entity's transform.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAuthority(pub PeerId);

/// Can collect coins.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct CoinCollector;

/// A full player actor, local or replicated.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct PlayerMarker;

/// A lightweight stand-in that only carries a collector's position.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct CollectorProxy;

/// Spawned for another peer. Destroyed when that peer leaves or the session
/// goes offline.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct RemoteReplica;

/// Flight of a collected coin toward its collector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    pub from: Vec3,
    pub collector: Entity,
    /// Last known target, kept if the collector disappears mid-flight.
    pub target: Vec3,
    pub elapsed: f32,
    pub duration: f32,
}

/// A coin. `collected` latches on the first accepted collection and never
/// clears.
#[derive(Component, Debug, Clone, Default)]
pub struct Collectible {
    pub collected: bool,
    pub collection_time: f32,
    pub trajectory: Option<Trajectory>,
    /// Collectors currently inside the pickup radius.
    pub(crate) overlapping: Vec<Entity>,
}

impl Collectible {
    pub fn new(collection_time: f32) -> Self {
        Self {
            collection_time,
            ..Self::default()
        }
    }
}
