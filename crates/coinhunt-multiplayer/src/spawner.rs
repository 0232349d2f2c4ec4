//! Replica spawning and position sync.
//!
//! A [`ReplicaSpawner`] keeps one representation per peer in the world. The
//! local peer's representation is the local player (or its collector proxy)
//! and carries the local authority; every other peer gets a
//! [`RemoteReplica`] named after it. The server tells newcomers about
//! everything that already exists.

use bevy_ecs::prelude::*;
use coinhunt_ecs::{EntityDirectory, Name, Position, Velocity, deregister_entity, register_entity};
use coinhunt_net::{
    LOCAL_PLAYER_NAME, Message, NetworkSession, PeerId, Recipient, SessionEvent,
    collector_proxy_name, networked_player_name,
};
use glam::Vec3;
use tracing::{debug, info};

use crate::{CoinCollector, CollectorProxy, NetworkAuthority, Outbox, PlayerMarker, RemoteReplica};

/// Which representation a spawner manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaKind {
    /// Full player actors, synced with position and velocity.
    Player,
    /// Collector proxies, synced with position only.
    CollectorProxy,
}

/// Creates, destroys and syncs per-peer representations.
#[derive(Debug, Clone)]
pub struct ReplicaSpawner {
    kind: ReplicaKind,
    sync_interval: f32,
    since_sync: f32,
    last_sent: Option<(Vec3, Vec3)>,
}

impl ReplicaSpawner {
    pub fn new(kind: ReplicaKind, sync_interval_ms: u32) -> Self {
        Self {
            kind,
            sync_interval: sync_interval_ms as f32 / 1000.0,
            since_sync: 0.0,
            last_sent: None,
        }
    }

    pub fn kind(&self) -> ReplicaKind {
        self.kind
    }

    /// Directory name of `peer`'s remote representation.
    pub fn replica_name(&self, peer: PeerId) -> String {
        match self.kind {
            ReplicaKind::Player => networked_player_name(peer),
            ReplicaKind::CollectorProxy => collector_proxy_name(peer),
        }
    }

    /// The remote representation of `peer`, if one exists.
    pub fn replica(&self, world: &World, peer: PeerId) -> Option<Entity> {
        world
            .resource::<EntityDirectory>()
            .get::<RemoteReplica>(world, &self.replica_name(peer))
    }

    /// The representation owned by this process.
    pub fn local_representation(&self, world: &mut World) -> Option<Entity> {
        match self.kind {
            ReplicaKind::Player => world
                .resource::<EntityDirectory>()
                .get::<PlayerMarker>(world, LOCAL_PLAYER_NAME),
            ReplicaKind::CollectorProxy => world
                .query_filtered::<Entity, (With<CollectorProxy>, Without<RemoteReplica>)>()
                .iter(world)
                .next(),
        }
    }

    /// Every remote representation with its owner and position.
    pub fn remote_replicas(&self, world: &mut World) -> Vec<(PeerId, Vec3)> {
        let mut replicas: Vec<(PeerId, Vec3)> = world
            .query_filtered::<(&NetworkAuthority, &Position), With<RemoteReplica>>()
            .iter(world)
            .map(|(a, p)| (a.0, p.0))
            .collect();
        replicas.sort_by_key(|(peer, _)| *peer);
        replicas
    }

    fn create_message(&self, peer_id: PeerId, position: Vec3) -> Message {
        match self.kind {
            ReplicaKind::Player => Message::CreatePlayerForPeer { peer_id, position },
            ReplicaKind::CollectorProxy => Message::CreateProxyForPeer { peer_id, position },
        }
    }

    // -----------------------------------------------------------------------
    // Local representation
    // -----------------------------------------------------------------------

    /// Make sure the local representation exists and carries `local`'s
    /// authority.
    pub fn ensure_local(&self, world: &mut World, local: PeerId) -> Option<Entity> {
        match self.kind {
            ReplicaKind::Player => {
                let player = self.local_representation(world)?;
                world.entity_mut(player).insert(NetworkAuthority(local));
                Some(player)
            }
            ReplicaKind::CollectorProxy => {
                let name = collector_proxy_name(local);
                if let Some(existing) = self.local_representation(world) {
                    let current = world.get::<Name>(existing).map(|n| n.0.clone());
                    if current.as_deref() == Some(name.as_str()) {
                        world.entity_mut(existing).insert(NetworkAuthority(local));
                        return Some(existing);
                    }
                    deregister_entity(world, existing);
                }
                let position = local_player_position(world);
                let proxy = register_entity(
                    world,
                    name,
                    (
                        Position(position),
                        CollectorProxy,
                        CoinCollector,
                        NetworkAuthority(local),
                    ),
                );
                Some(proxy)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Remote representations
    // -----------------------------------------------------------------------

    /// Create `peer`'s representation unless it already exists.
    pub fn create_remote(&self, world: &mut World, peer: PeerId, position: Vec3) -> Entity {
        if let Some(existing) = self.replica(world, peer) {
            return existing;
        }
        let name = self.replica_name(peer);
        info!(%peer, %name, "replica created");
        match self.kind {
            ReplicaKind::Player => register_entity(
                world,
                name,
                (
                    Position(position),
                    Velocity::default(),
                    PlayerMarker,
                    CoinCollector,
                    NetworkAuthority(peer),
                    RemoteReplica,
                ),
            ),
            ReplicaKind::CollectorProxy => register_entity(
                world,
                name,
                (
                    Position(position),
                    CollectorProxy,
                    CoinCollector,
                    NetworkAuthority(peer),
                    RemoteReplica,
                ),
            ),
        }
    }

    /// Destroy `peer`'s representation. Returns `false` if there was none.
    pub fn destroy_remote(&self, world: &mut World, peer: PeerId) -> bool {
        let Some(replica) = self.replica(world, peer) else {
            return false;
        };
        info!(%peer, "replica destroyed");
        deregister_entity(world, replica)
    }

    fn destroy_all_remote(&self, world: &mut World) {
        let replicas: Vec<Entity> = world
            .query_filtered::<Entity, With<RemoteReplica>>()
            .iter(world)
            .collect();
        for replica in replicas {
            deregister_entity(world, replica);
        }
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    pub fn on_session_event(
        &mut self,
        world: &mut World,
        session: &NetworkSession,
        event: &SessionEvent,
        out: &mut Outbox,
    ) {
        let local = session.local_peer_id();
        match event {
            SessionEvent::PeerConnected(peer) if *peer == local => {
                let Some(entity) = self.ensure_local(world, local) else {
                    return;
                };
                if session.is_hosting() {
                    let position = position_of(world, entity);
                    out.push(Recipient::Broadcast, self.create_message(local, position));
                }
            }
            SessionEvent::PeerConnected(peer) => {
                self.create_remote(world, *peer, Vec3::ZERO);
                if session.is_hosting() {
                    self.introduce(world, local, *peer, out);
                }
            }
            SessionEvent::PeerDisconnected(peer) if *peer != local => {
                self.destroy_remote(world, *peer);
                withdraw_announcements(out, *peer);
            }
            SessionEvent::OnlineChanged(true) => {
                self.ensure_local(world, local);
            }
            SessionEvent::OnlineChanged(false) => {
                self.destroy_all_remote(world);
                self.ensure_local(world, PeerId::HOST);
                self.last_sent = None;
                self.since_sync = 0.0;
            }
            _ => {}
        }
    }

    /// Server: announce `newcomer` to everyone and everything to `newcomer`.
    fn introduce(&self, world: &mut World, local: PeerId, newcomer: PeerId, out: &mut Outbox) {
        out.push(
            Recipient::Broadcast,
            self.create_message(newcomer, Vec3::ZERO),
        );
        if let Some(entity) = self.local_representation(world) {
            let position = position_of(world, entity);
            out.push(Recipient::Peer(newcomer), self.create_message(local, position));
        }
        for (peer, position) in self.remote_replicas(world) {
            if peer != newcomer {
                out.push(Recipient::Peer(newcomer), self.create_message(peer, position));
            }
        }
    }

    /// Apply a replica message. Returns `false` for messages this spawner
    /// does not handle.
    pub fn on_message(&mut self, world: &mut World, session: &NetworkSession, message: &Message) -> bool {
        let local = session.local_peer_id();
        match (self.kind, message) {
            (ReplicaKind::Player, Message::CreatePlayerForPeer { peer_id, position })
            | (ReplicaKind::CollectorProxy, Message::CreateProxyForPeer { peer_id, position }) => {
                if *peer_id != local {
                    self.create_remote(world, *peer_id, *position);
                }
            }
            (
                ReplicaKind::Player,
                Message::ReceiveNetworkState {
                    peer_id,
                    position,
                    velocity,
                },
            ) => {
                if let Some(replica) = self.writable_replica(world, *peer_id, local) {
                    world.entity_mut(replica).insert((Position(*position), Velocity(*velocity)));
                }
            }
            (ReplicaKind::CollectorProxy, Message::UpdateProxyPosition { peer_id, position }) => {
                if let Some(replica) = self.writable_replica(world, *peer_id, local) {
                    world.entity_mut(replica).insert(Position(*position));
                }
            }
            (
                _,
                Message::CreatePlayerForPeer { .. }
                | Message::CreateProxyForPeer { .. }
                | Message::ReceiveNetworkState { .. }
                | Message::UpdateProxyPosition { .. },
            ) => {
                debug!(kind = message.kind(), "replica message for other kind ignored");
            }
            _ => return false,
        }
        true
    }

    /// The replica a sync for `peer` may overwrite. Never our own.
    fn writable_replica(&self, world: &World, peer: PeerId, local: PeerId) -> Option<Entity> {
        if peer == local {
            return None;
        }
        let replica = self.replica(world, peer);
        if replica.is_none() {
            debug!(%peer, "sync for unknown replica dropped");
        }
        replica.filter(|&e| world.get::<NetworkAuthority>(e).map(|a| a.0) != Some(local))
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Follow the local player and broadcast the local representation every
    /// sync interval while online.
    pub fn sync(&mut self, world: &mut World, session: &NetworkSession, delta: f32, out: &mut Outbox) {
        if self.kind == ReplicaKind::CollectorProxy {
            let position = local_player_position(world);
            if let Some(proxy) = self.local_representation(world) {
                world.entity_mut(proxy).insert(Position(position));
            }
        }

        if !session.is_online() {
            self.since_sync = 0.0;
            return;
        }
        self.since_sync += delta;
        if self.since_sync < self.sync_interval {
            return;
        }
        self.since_sync = 0.0;

        let local = session.local_peer_id();
        let Some(entity) = self.local_representation(world) else {
            return;
        };
        if world.get::<NetworkAuthority>(entity).map(|a| a.0) != Some(local) {
            return;
        }
        let position = position_of(world, entity);
        match self.kind {
            ReplicaKind::Player => {
                let velocity = world
                    .get::<Velocity>(entity)
                    .map(|v| v.0)
                    .unwrap_or_default();
                if self.last_sent == Some((position, velocity)) {
                    return;
                }
                self.last_sent = Some((position, velocity));
                out.push(
                    Recipient::Broadcast,
                    Message::ReceiveNetworkState {
                        peer_id: local,
                        position,
                        velocity,
                    },
                );
            }
            ReplicaKind::CollectorProxy => out.push(
                Recipient::Broadcast,
                Message::UpdateProxyPosition {
                    peer_id: local,
                    position,
                },
            ),
        }
    }
}

/// Drop queued messages that announce `peer` or are addressed to it. A peer
/// that leaves in the tick it joined must not reach other clients after its
/// unregistration.
fn withdraw_announcements(out: &mut Outbox, peer: PeerId) {
    out.retain(|(recipient, message)| {
        let announces = matches!(
            message,
            Message::CreatePlayerForPeer { peer_id, .. } | Message::CreateProxyForPeer { peer_id, .. }
                if *peer_id == peer
        );
        !announces && *recipient != Recipient::Peer(peer)
    });
}

fn position_of(world: &World, entity: Entity) -> Vec3 {
    world
        .get::<Position>(entity)
        .map(|p| p.0)
        .unwrap_or_default()
}

fn local_player_position(world: &World) -> Vec3 {
    world
        .resource::<EntityDirectory>()
        .get_component::<Position>(world, LOCAL_PLAYER_NAME)
        .map(|p| p.0)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinhunt_ecs::create_world;

    fn world_with_player() -> World {
        let mut world = create_world();
        register_entity(
            &mut world,
            LOCAL_PLAYER_NAME,
            (
                Position(Vec3::new(1.0, 0.0, 1.0)),
                Velocity::default(),
                PlayerMarker,
                CoinCollector,
                NetworkAuthority(PeerId::HOST),
            ),
        );
        world
    }

    fn hosting() -> NetworkSession {
        let mut session = NetworkSession::new();
        session.host_game(7777);
        session
    }

    fn client(id: u32) -> NetworkSession {
        let mut session = NetworkSession::new();
        session.join_game("127.0.0.1", 7777);
        session.connected_to_server(PeerId(id));
        session
    }

    #[test]
    fn test_host_broadcasts_local_player() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let mut out = Outbox::new();
        spawner.on_session_event(&mut world, &hosting(), &SessionEvent::PeerConnected(PeerId::HOST), &mut out);
        assert_eq!(
            out.messages(),
            &[(
                Recipient::Broadcast,
                Message::CreatePlayerForPeer {
                    peer_id: PeerId::HOST,
                    position: Vec3::new(1.0, 0.0, 1.0),
                }
            )]
        );
    }

    #[test]
    fn test_server_introduces_newcomer() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let session = hosting();
        let mut out = Outbox::new();
        spawner.on_session_event(&mut world, &session, &SessionEvent::PeerConnected(PeerId(2)), &mut out);
        out.drain().for_each(drop);
        spawner.on_session_event(&mut world, &session, &SessionEvent::PeerConnected(PeerId(3)), &mut out);

        let replica = spawner.replica(&world, PeerId(3)).unwrap();
        assert_eq!(world.get::<NetworkAuthority>(replica).unwrap().0, PeerId(3));
        assert_eq!(world.get::<Name>(replica).unwrap().as_str(), "Player_3");
        assert_eq!(
            out.messages(),
            &[
                (
                    Recipient::Broadcast,
                    Message::CreatePlayerForPeer {
                        peer_id: PeerId(3),
                        position: Vec3::ZERO
                    }
                ),
                (
                    Recipient::Peer(PeerId(3)),
                    Message::CreatePlayerForPeer {
                        peer_id: PeerId::HOST,
                        position: Vec3::new(1.0, 0.0, 1.0)
                    }
                ),
                (
                    Recipient::Peer(PeerId(3)),
                    Message::CreatePlayerForPeer {
                        peer_id: PeerId(2),
                        position: Vec3::ZERO
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_create_message_for_self_is_ignored() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let session = client(2);
        let own = Message::CreatePlayerForPeer {
            peer_id: PeerId(2),
            position: Vec3::ZERO,
        };
        assert!(spawner.on_message(&mut world, &session, &own));
        assert!(spawner.replica(&world, PeerId(2)).is_none());

        let host = Message::CreatePlayerForPeer {
            peer_id: PeerId::HOST,
            position: Vec3::X,
        };
        spawner.on_message(&mut world, &session, &host);
        spawner.on_message(&mut world, &session, &host);
        let replica = spawner.replica(&world, PeerId::HOST).unwrap();
        assert_eq!(world.get::<Position>(replica).unwrap().0, Vec3::X);
        assert_eq!(spawner.remote_replicas(&mut world).len(), 1);
    }

    #[test]
    fn test_network_state_overwrites_replica_only() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let session = client(2);
        spawner.create_remote(&mut world, PeerId(3), Vec3::ZERO);

        let state = Message::ReceiveNetworkState {
            peer_id: PeerId(3),
            position: Vec3::new(4.0, 0.0, 4.0),
            velocity: Vec3::X,
        };
        spawner.on_message(&mut world, &session, &state);
        let replica = spawner.replica(&world, PeerId(3)).unwrap();
        assert_eq!(world.get::<Position>(replica).unwrap().0, Vec3::new(4.0, 0.0, 4.0));
        assert_eq!(world.get::<Velocity>(replica).unwrap().0, Vec3::X);

        let own = Message::ReceiveNetworkState {
            peer_id: PeerId(2),
            position: Vec3::splat(9.0),
            velocity: Vec3::ZERO,
        };
        spawner.on_message(&mut world, &session, &own);
        let player = spawner.local_representation(&mut world).unwrap();
        assert_eq!(world.get::<Position>(player).unwrap().0, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_going_offline_clears_replicas_and_resets_authority() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let session = client(2);
        let mut out = Outbox::new();
        spawner.on_session_event(&mut world, &session, &SessionEvent::OnlineChanged(true), &mut out);
        let player = spawner.local_representation(&mut world).unwrap();
        assert_eq!(world.get::<NetworkAuthority>(player).unwrap().0, PeerId(2));

        spawner.create_remote(&mut world, PeerId::HOST, Vec3::ZERO);
        spawner.create_remote(&mut world, PeerId(3), Vec3::ZERO);
        spawner.on_session_event(&mut world, &session, &SessionEvent::OnlineChanged(false), &mut out);
        assert!(spawner.remote_replicas(&mut world).is_empty());
        assert_eq!(world.get::<NetworkAuthority>(player).unwrap().0, PeerId::HOST);
        assert!(!world.resource::<EntityDirectory>().contains("Player_3"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_peer_disconnect_destroys_replica() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let mut out = Outbox::new();
        spawner.create_remote(&mut world, PeerId(3), Vec3::ZERO);
        spawner.on_session_event(&mut world, &client(2), &SessionEvent::PeerDisconnected(PeerId(3)), &mut out);
        assert!(spawner.replica(&world, PeerId(3)).is_none());
        assert!(!spawner.destroy_remote(&mut world, PeerId(3)));
    }

    #[test]
    fn test_peer_leaving_in_same_tick_withdraws_its_announcements() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let session = hosting();
        let mut out = Outbox::new();
        for event in [
            SessionEvent::PeerConnected(PeerId(2)),
            SessionEvent::PeerConnected(PeerId(3)),
            SessionEvent::PeerDisconnected(PeerId(3)),
        ] {
            spawner.on_session_event(&mut world, &session, &event, &mut out);
        }

        assert!(spawner.replica(&world, PeerId(3)).is_none());
        assert_eq!(
            out.messages(),
            &[
                (
                    Recipient::Broadcast,
                    Message::CreatePlayerForPeer {
                        peer_id: PeerId(2),
                        position: Vec3::ZERO
                    }
                ),
                (
                    Recipient::Peer(PeerId(2)),
                    Message::CreatePlayerForPeer {
                        peer_id: PeerId::HOST,
                        position: Vec3::new(1.0, 0.0, 1.0)
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_player_sync_only_when_changed() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let session = hosting();
        let mut out = Outbox::new();

        spawner.sync(&mut world, &session, 0.03, &mut out);
        assert!(out.is_empty());
        spawner.sync(&mut world, &session, 0.03, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out.messages()[0].1.channel(), coinhunt_net::Channel::Unreliable);

        spawner.sync(&mut world, &session, 0.06, &mut out);
        assert_eq!(out.len(), 1);

        let player = spawner.local_representation(&mut world).unwrap();
        world.get_mut::<Position>(player).unwrap().0 = Vec3::splat(2.0);
        spawner.sync(&mut world, &session, 0.06, &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_no_sync_offline() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::Player, 50);
        let mut out = Outbox::new();
        spawner.sync(&mut world, &NetworkSession::new(), 1.0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_proxy_follows_player_and_is_renamed_on_join() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::CollectorProxy, 50);
        let offline = spawner.ensure_local(&mut world, PeerId::HOST).unwrap();
        assert_eq!(world.get::<Name>(offline).unwrap().as_str(), "CollectorProxy_1");

        let session = client(4);
        let mut out = Outbox::new();
        spawner.on_session_event(&mut world, &session, &SessionEvent::OnlineChanged(true), &mut out);
        let proxy = spawner.local_representation(&mut world).unwrap();
        assert_eq!(world.get::<Name>(proxy).unwrap().as_str(), "CollectorProxy_4");
        assert!(!world.resource::<EntityDirectory>().contains("CollectorProxy_1"));

        let player = world.resource::<EntityDirectory>().entity(LOCAL_PLAYER_NAME).unwrap();
        world.get_mut::<Position>(player).unwrap().0 = Vec3::new(3.0, 0.0, 0.0);
        spawner.sync(&mut world, &session, 0.05, &mut out);
        assert_eq!(world.get::<Position>(proxy).unwrap().0, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(
            out.messages(),
            &[(
                Recipient::Broadcast,
                Message::UpdateProxyPosition {
                    peer_id: PeerId(4),
                    position: Vec3::new(3.0, 0.0, 0.0),
                }
            )]
        );
    }

    #[test]
    fn test_messages_for_other_kind_are_ignored() {
        let mut world = world_with_player();
        let mut spawner = ReplicaSpawner::new(ReplicaKind::CollectorProxy, 50);
        let message = Message::CreatePlayerForPeer {
            peer_id: PeerId(3),
            position: Vec3::ZERO,
        };
        assert!(spawner.on_message(&mut world, &client(2), &message));
        assert!(spawner.remote_replicas(&mut world).is_empty());

        let unrelated = Message::UnregisterPeerOnClient { peer_id: PeerId(3) };
        assert!(!spawner.on_message(&mut world, &client(2), &unrelated));
    }
}
