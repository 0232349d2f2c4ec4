//! One participant's game loop: session driver, world, local player,
//! replicas and collectibles, advanced together by [`GameNode::tick`].

use bevy_ecs::prelude::*;
use coinhunt_config::Config;
use coinhunt_ecs::{
    EntityDirectory, Grounded, Orientation, Position, TimeRes, Velocity, create_world,
    register_entity,
};
use coinhunt_net::{
    LOCAL_PLAYER_NAME, Message, NetworkEvent, NetworkSession, PeerId, SessionDriver, Transport,
};
use coinhunt_player::{FlatFloor, PlayerController, PlayerInputFrame, Settings};
use glam::{Quat, Vec3};
use tracing::{debug, info};

use crate::{
    CoinCollector, Collectible, NetworkAuthority, Outbox, PlayerMarker, ReplicaKind,
    ReplicaSpawner, collection_step, detect_collectors, on_collector_entered,
    on_request_collection, on_start_collection_remote,
};

/// A headless game participant.
pub struct GameNode<T: Transport> {
    world: World,
    driver: SessionDriver<T>,
    spawner: ReplicaSpawner,
    player: PlayerController,
    player_entity: Entity,
    floor: FlatFloor,
    pickup_radius: f32,
    collection_time: f32,
    outbox: Outbox,
}

impl<T: Transport> GameNode<T> {
    /// An offline node with the local player standing at the origin.
    pub fn new(config: &Config, transport: T, kind: ReplicaKind) -> Self {
        let mut world = create_world();
        let player_entity = register_entity(
            &mut world,
            LOCAL_PLAYER_NAME,
            (
                Position::default(),
                Velocity::default(),
                Grounded(true),
                Orientation::default(),
                PlayerMarker,
                NetworkAuthority(PeerId::HOST),
            ),
        );
        if kind == ReplicaKind::Player {
            world.entity_mut(player_entity).insert(CoinCollector);
        }
        let spawner = ReplicaSpawner::new(kind, config.network.sync_interval_ms);
        spawner.ensure_local(&mut world, PeerId::HOST);

        let mut player = PlayerController::new(Settings::from(&config.locomotion), Vec3::ZERO);
        player.set_authority(true);

        Self {
            world,
            driver: SessionDriver::new(transport, config.network.player_name.clone()),
            spawner,
            player,
            player_entity,
            floor: FlatFloor::default(),
            pickup_radius: config.collectible.pickup_radius,
            collection_time: config.collectible.collection_time_secs,
            outbox: Outbox::new(),
        }
    }

    pub fn host_game(&mut self, port: u16) {
        self.driver.host_game(port);
    }

    pub fn join_game(&mut self, address: impl Into<String>, port: u16) {
        self.driver.join_game(address, port);
    }

    pub fn disconnect(&mut self) {
        self.driver.disconnect();
    }

    pub fn session(&self) -> &NetworkSession {
        self.driver.session()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn player(&self) -> &PlayerController {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlayerController {
        &mut self.player
    }

    pub fn spawner(&self) -> &ReplicaSpawner {
        &self.spawner
    }

    pub fn set_floor(&mut self, floor: FlatFloor) {
        self.floor = floor;
    }

    /// Place a coin named `name` at `position`.
    pub fn spawn_coin(&mut self, name: impl Into<String>, position: Vec3) -> Entity {
        register_entity(
            &mut self.world,
            name,
            (Position(position), Collectible::new(self.collection_time)),
        )
    }

    /// A coin by name, if it still exists.
    pub fn coin(&self, name: &str) -> Option<&Collectible> {
        self.world
            .resource::<EntityDirectory>()
            .get_component::<Collectible>(&self.world, name)
    }

    /// The local player's facing as stored on its entity.
    pub fn facing(&self) -> Quat {
        self.world
            .get::<Orientation>(self.player_entity)
            .map(|o| o.0)
            .unwrap_or_default()
    }

    /// Advance one frame. Returns the network events handled this frame.
    pub fn tick(&mut self, delta: f32, input: PlayerInputFrame) -> Vec<NetworkEvent> {
        self.world.resource_mut::<TimeRes>().advance(delta);
        let delta = self.world.resource::<TimeRes>().delta;

        let events = self.driver.poll();
        for event in &events {
            self.handle_event(event);
        }

        let local = self.driver.session().local_peer_id();
        let authority = self.world.get::<NetworkAuthority>(self.player_entity).map(|a| a.0);
        self.player.set_authority(authority == Some(local));
        let mut mover = self.floor;
        self.player
            .update(PlayerInputFrame { delta, ..input }, &mut mover, &self.floor);
        let body = *self.player.body();
        self.world.entity_mut(self.player_entity).insert((
            Position(body.position),
            Velocity(body.velocity),
            Grounded(body.on_floor),
            Orientation(facing_rotation(
                self.player.machine().data().last_strong_direction,
            )),
        ));

        let session = self.driver.session();
        self.spawner.sync(&mut self.world, session, delta, &mut self.outbox);
        for (coin, collector) in detect_collectors(&mut self.world, self.pickup_radius) {
            on_collector_entered(&mut self.world, session, coin, collector, &mut self.outbox);
        }
        collection_step(&mut self.world, delta);

        let outgoing: Vec<_> = self.outbox.drain().collect();
        for (recipient, message) in outgoing {
            self.driver.send(recipient, message);
        }
        events
    }

    fn handle_event(&mut self, event: &NetworkEvent) {
        let session = self.driver.session();
        match event {
            NetworkEvent::Session(event) => {
                self.spawner
                    .on_session_event(&mut self.world, session, event, &mut self.outbox);
            }
            NetworkEvent::Message { from, message } => match message {
                Message::RequestCollection {
                    collectible,
                    collector_name,
                } => {
                    debug!(%from, %collectible, %collector_name, "collection requested");
                    on_request_collection(
                        &mut self.world,
                        session,
                        collectible,
                        collector_name,
                        &mut self.outbox,
                    );
                }
                Message::StartCollectionRemote {
                    collectible,
                    collector_name,
                } => {
                    info!(%collectible, %collector_name, "collection started remotely");
                    on_start_collection_remote(&mut self.world, session, collectible, collector_name);
                }
                message => {
                    if !self.spawner.on_message(&mut self.world, session, message) {
                        debug!(%from, kind = message.kind(), "unhandled message");
                    }
                }
            },
        }
    }
}

/// Yaw that turns the rest facing (`-Z`) toward `direction`.
fn facing_rotation(direction: Vec3) -> Quat {
    let planar = Vec3::new(direction.x, 0.0, direction.z);
    if planar.length_squared() < 1e-6 {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(f32::atan2(-planar.x, -planar.z))
}
