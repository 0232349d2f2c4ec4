//! Coin collection arbitration.
//!
//! Every participant detects collectors entering a coin's pickup radius. What
//! happens next depends on the session:
//! - offline: collect immediately;
//! - server: collect, then broadcast `StartCollectionRemote`;
//! - client: if the collector is the local authority, ask the server with
//!   `RequestCollection` and wait for the broadcast.
//!
//! The `collected` latch makes every later attempt on the same coin a no-op,
//! which is what resolves races between peers.

use bevy_ecs::prelude::*;
use coinhunt_ecs::{EntityDirectory, Name, Position, deregister_entity};
use coinhunt_net::{
    LOCAL_PLAYER_NAME, Message, NetworkSession, PeerId, Recipient, SessionState,
    networked_player_name,
};
use glam::Vec3;
use tracing::{debug, info};

use crate::{CoinCollector, Collectible, NetworkAuthority, Outbox, PlayerMarker, Trajectory};

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// The name other peers know `collector` by. Players are addressed by their
/// authority (`Player_<id>`); anything else by its directory name.
pub fn collector_network_name(world: &World, collector: Entity) -> Option<String> {
    if world.get::<PlayerMarker>(collector).is_some() {
        if let Some(authority) = world.get::<NetworkAuthority>(collector) {
            return Some(networked_player_name(authority.0));
        }
    }
    world.get::<Name>(collector).map(|n| n.0.clone())
}

/// Find a collector by network name. `Player_<local id>` falls back to the
/// local `"Player"` entity, which is never registered under its network name.
pub fn resolve_collector(world: &World, name: &str, local: PeerId) -> Option<Entity> {
    let directory = world.resource::<EntityDirectory>();
    directory.get::<CoinCollector>(world, name).or_else(|| {
        if name == networked_player_name(local) {
            directory.get::<CoinCollector>(world, LOCAL_PLAYER_NAME)
        } else {
            None
        }
    })
}

pub fn resolve_collectible(world: &World, name: &str) -> Option<Entity> {
    world
        .resource::<EntityDirectory>()
        .get::<Collectible>(world, name)
}

fn is_collected(world: &World, collectible: Entity) -> bool {
    world
        .get::<Collectible>(collectible)
        .is_none_or(|c| c.collected)
}

fn center_of_mass(world: &World, entity: Entity) -> Option<Vec3> {
    world.get::<Position>(entity).map(|p| p.0 + Vec3::Y)
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Latch `collectible` and send it flying toward `collector`. Returns `false`
/// if it was already collected or either entity is gone.
pub fn start_collection(world: &mut World, collectible: Entity, collector: Entity) -> bool {
    let Some(target) = center_of_mass(world, collector) else {
        return false;
    };
    let from = world
        .get::<Position>(collectible)
        .map(|p| p.0)
        .unwrap_or_default();
    let Some(mut coin) = world.get_mut::<Collectible>(collectible) else {
        return false;
    };
    if coin.collected {
        return false;
    }
    coin.collected = true;
    coin.trajectory = Some(Trajectory {
        from,
        collector,
        target,
        elapsed: 0.0,
        duration: coin.collection_time,
    });
    info!(?collectible, ?collector, "collection started");
    true
}

/// A collector entered a coin's pickup radius on this participant.
pub fn on_collector_entered(
    world: &mut World,
    session: &NetworkSession,
    collectible: Entity,
    collector: Entity,
    out: &mut Outbox,
) {
    if is_collected(world, collectible) {
        return;
    }
    match session.state() {
        SessionState::Offline => {
            start_collection(world, collectible, collector);
        }
        SessionState::Hosting => {
            let names = (
                world.get::<Name>(collectible).map(|n| n.0.clone()),
                collector_network_name(world, collector),
            );
            if start_collection(world, collectible, collector) {
                if let (Some(collectible), Some(collector_name)) = names {
                    out.push(
                        Recipient::Broadcast,
                        Message::StartCollectionRemote {
                            collectible,
                            collector_name,
                        },
                    );
                }
            }
        }
        SessionState::Client => {
            let local = session.local_peer_id();
            if world.get::<NetworkAuthority>(collector).map(|a| a.0) != Some(local) {
                return;
            }
            let Some(collectible) = world.get::<Name>(collectible).map(|n| n.0.clone()) else {
                return;
            };
            let Some(collector_name) = collector_network_name(world, collector) else {
                return;
            };
            debug!(%collectible, %collector_name, "requesting collection");
            out.push(
                Recipient::Server,
                Message::RequestCollection {
                    collectible,
                    collector_name,
                },
            );
        }
    }
}

/// Server side of `RequestCollection`.
pub fn on_request_collection(
    world: &mut World,
    session: &NetworkSession,
    collectible_name: &str,
    collector_name: &str,
    out: &mut Outbox,
) {
    if !session.is_hosting() {
        debug!(collectible = collectible_name, "RequestCollection ignored, not hosting");
        return;
    }
    let Some(collectible) = resolve_collectible(world, collectible_name) else {
        debug!(collectible = collectible_name, "unknown collectible, request dropped");
        return;
    };
    if is_collected(world, collectible) {
        debug!(collectible = collectible_name, "already collected, request dropped");
        return;
    }
    let Some(collector) = resolve_collector(world, collector_name, session.local_peer_id()) else {
        debug!(collector = collector_name, "unknown collector, request dropped");
        return;
    };
    if start_collection(world, collectible, collector) {
        out.push(
            Recipient::Broadcast,
            Message::StartCollectionRemote {
                collectible: collectible_name.to_string(),
                collector_name: collector_name.to_string(),
            },
        );
    }
}

/// Client side of `StartCollectionRemote`.
pub fn on_start_collection_remote(
    world: &mut World,
    session: &NetworkSession,
    collectible_name: &str,
    collector_name: &str,
) {
    let Some(collectible) = resolve_collectible(world, collectible_name) else {
        debug!(collectible = collectible_name, "unknown collectible, start dropped");
        return;
    };
    if is_collected(world, collectible) {
        return;
    }
    let Some(collector) = resolve_collector(world, collector_name, session.local_peer_id()) else {
        debug!(collector = collector_name, "unknown collector, start dropped");
        return;
    };
    start_collection(world, collectible, collector);
}

// ---------------------------------------------------------------------------
// Detection and flight
// ---------------------------------------------------------------------------

/// Collectors that entered a live coin's `radius` since the last call, as
/// `(collectible, collector)` pairs.
pub fn detect_collectors(world: &mut World, radius: f32) -> Vec<(Entity, Entity)> {
    let collectors: Vec<(Entity, Vec3)> = world
        .query_filtered::<(Entity, &Position), With<CoinCollector>>()
        .iter(world)
        .map(|(e, p)| (e, p.0))
        .collect();

    let mut entered = Vec::new();
    let mut coins = world.query::<(Entity, &Position, &mut Collectible)>();
    for (coin, position, mut collectible) in coins.iter_mut(world) {
        if collectible.collected {
            continue;
        }
        let inside: Vec<Entity> = collectors
            .iter()
            .filter(|(_, p)| p.distance(position.0) <= radius)
            .map(|(e, _)| *e)
            .collect();
        for collector in &inside {
            if !collectible.overlapping.contains(collector) {
                entered.push((coin, *collector));
            }
        }
        collectible.overlapping = inside;
    }
    entered
}

/// Advance every flying coin. A coin that reaches its collector is
/// deregistered and despawned.
pub fn collection_step(world: &mut World, delta: f32) {
    let flights: Vec<(Entity, Entity)> = world
        .query::<(Entity, &Collectible)>()
        .iter(world)
        .filter_map(|(e, c)| c.trajectory.map(|t| (e, t.collector)))
        .collect();

    for (coin, collector) in flights {
        let target = center_of_mass(world, collector);
        let Some((position, arrived)) = advance_flight(world, coin, target, delta) else {
            continue;
        };
        if arrived {
            debug!(?coin, "collectible reached collector");
            deregister_entity(world, coin);
        } else if let Some(mut p) = world.get_mut::<Position>(coin) {
            p.0 = position;
        }
    }
}

fn advance_flight(
    world: &mut World,
    coin: Entity,
    target: Option<Vec3>,
    delta: f32,
) -> Option<(Vec3, bool)> {
    let mut collectible = world.get_mut::<Collectible>(coin)?;
    let trajectory = collectible.trajectory.as_mut()?;
    if let Some(target) = target {
        trajectory.target = target;
    }
    trajectory.elapsed += delta;
    let t = if trajectory.duration > 0.0 {
        (trajectory.elapsed / trajectory.duration).min(1.0)
    } else {
        1.0
    };
    Some((trajectory.from.lerp(trajectory.target, t), t >= 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinhunt_ecs::{create_world, register_entity};

    fn world_with_coin() -> (World, Entity) {
        let mut world = create_world();
        let coin = register_entity(
            &mut world,
            "Coin_0",
            (Position(Vec3::new(5.0, 0.0, 0.0)), Collectible::new(1.0)),
        );
        (world, coin)
    }

    fn remote_player(world: &mut World, id: u32) -> Entity {
        register_entity(
            world,
            networked_player_name(PeerId(id)),
            (
                Position(Vec3::new(5.0, 0.0, 0.0)),
                PlayerMarker,
                CoinCollector,
                NetworkAuthority(PeerId(id)),
            ),
        )
    }

    fn local_player(world: &mut World, id: PeerId) -> Entity {
        register_entity(
            world,
            LOCAL_PLAYER_NAME,
            (Position(Vec3::ZERO), PlayerMarker, CoinCollector, NetworkAuthority(id)),
        )
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
    fn test_player_network_name_uses_authority() {
        let mut world = create_world();
        let player = local_player(&mut world, PeerId(3));
        assert_eq!(collector_network_name(&world, player).as_deref(), Some("Player_3"));

        let proxy = register_entity(&mut world, "CollectorProxy_4", (Position::default(), CoinCollector));
        assert_eq!(
            collector_network_name(&world, proxy).as_deref(),
            Some("CollectorProxy_4")
        );
    }

    #[test]
    fn test_host_alias_resolves_local_player() {
        let mut world = create_world();
        let player = local_player(&mut world, PeerId(2));
        assert_eq!(resolve_collector(&world, "Player_2", PeerId(2)), Some(player));
        assert_eq!(resolve_collector(&world, "Player_3", PeerId(2)), None);
        assert_eq!(resolve_collector(&world, "Player2", PeerId(2)), None);
    }

    #[test]
    fn test_request_latches_broadcasts_and_dedupes() {
        let (mut world, coin) = world_with_coin();
        let collector = remote_player(&mut world, 7);
        let session = hosting();
        let mut out = Outbox::new();

        on_request_collection(&mut world, &session, "Coin_0", "Player_7", &mut out);
        let c = world.get::<Collectible>(coin).unwrap();
        assert!(c.collected);
        assert_eq!(c.trajectory.unwrap().collector, collector);
        assert_eq!(
            out.messages(),
            &[(
                Recipient::Broadcast,
                Message::StartCollectionRemote {
                    collectible: "Coin_0".into(),
                    collector_name: "Player_7".into(),
                }
            )]
        );

        on_request_collection(&mut world, &session, "Coin_0", "Player_7", &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_request_with_unknown_names_is_dropped() {
        let (mut world, coin) = world_with_coin();
        let session = hosting();
        let mut out = Outbox::new();
        on_request_collection(&mut world, &session, "Coin_0", "Player_9", &mut out);
        on_request_collection(&mut world, &session, "Coin_404", "Player_9", &mut out);
        assert!(out.is_empty());
        assert!(!world.get::<Collectible>(coin).unwrap().collected);
    }

    #[test]
    fn test_request_ignored_on_client() {
        let (mut world, coin) = world_with_coin();
        remote_player(&mut world, 7);
        let mut out = Outbox::new();
        on_request_collection(&mut world, &client(2), "Coin_0", "Player_7", &mut out);
        assert!(out.is_empty());
        assert!(!world.get::<Collectible>(coin).unwrap().collected);
    }

    #[test]
    fn test_remote_start_resolves_own_player_through_alias() {
        let (mut world, coin) = world_with_coin();
        let player = local_player(&mut world, PeerId(2));
        on_start_collection_remote(&mut world, &client(2), "Coin_0", "Player_2");
        let c = world.get::<Collectible>(coin).unwrap();
        assert!(c.collected);
        assert_eq!(c.trajectory.unwrap().collector, player);
    }

    #[test]
    fn test_offline_entry_collects_immediately() {
        let (mut world, coin) = world_with_coin();
        let player = local_player(&mut world, PeerId::HOST);
        let mut out = Outbox::new();
        on_collector_entered(&mut world, &NetworkSession::new(), coin, player, &mut out);
        assert!(world.get::<Collectible>(coin).unwrap().collected);
        assert!(out.is_empty());
    }

    #[test]
    fn test_server_entry_collects_and_broadcasts_network_name() {
        let (mut world, coin) = world_with_coin();
        let player = local_player(&mut world, PeerId::HOST);
        let mut out = Outbox::new();
        on_collector_entered(&mut world, &hosting(), coin, player, &mut out);
        assert!(world.get::<Collectible>(coin).unwrap().collected);
        assert_eq!(
            out.messages(),
            &[(
                Recipient::Broadcast,
                Message::StartCollectionRemote {
                    collectible: "Coin_0".into(),
                    collector_name: "Player_1".into(),
                }
            )]
        );
    }

    #[test]
    fn test_client_only_requests_for_local_authority() {
        let (mut world, coin) = world_with_coin();
        let player = local_player(&mut world, PeerId(2));
        let other = remote_player(&mut world, 3);
        let session = client(2);
        let mut out = Outbox::new();

        on_collector_entered(&mut world, &session, coin, other, &mut out);
        assert!(out.is_empty());

        on_collector_entered(&mut world, &session, coin, player, &mut out);
        assert_eq!(
            out.messages(),
            &[(
                Recipient::Server,
                Message::RequestCollection {
                    collectible: "Coin_0".into(),
                    collector_name: "Player_2".into(),
                }
            )]
        );
        // The client waits for the server before latching.
        assert!(!world.get::<Collectible>(coin).unwrap().collected);
    }

    #[test]
    fn test_detect_reports_entry_once() {
        let (mut world, coin) = world_with_coin();
        let player = remote_player(&mut world, 4);
        assert_eq!(detect_collectors(&mut world, 1.0), vec![(coin, player)]);
        assert!(detect_collectors(&mut world, 1.0).is_empty());

        world.get_mut::<Position>(player).unwrap().0 = Vec3::new(50.0, 0.0, 0.0);
        assert!(detect_collectors(&mut world, 1.0).is_empty());
        world.get_mut::<Position>(player).unwrap().0 = Vec3::new(5.5, 0.0, 0.0);
        assert_eq!(detect_collectors(&mut world, 1.0), vec![(coin, player)]);
    }

    #[test]
    fn test_collected_coin_flies_and_despawns() {
        let (mut world, coin) = world_with_coin();
        let player = local_player(&mut world, PeerId::HOST);
        assert!(start_collection(&mut world, coin, player));
        assert!(!start_collection(&mut world, coin, player));

        collection_step(&mut world, 0.5);
        let p = world.get::<Position>(coin).unwrap().0;
        assert!((p - Vec3::new(2.5, 0.5, 0.0)).length() < 1e-5);

        collection_step(&mut world, 0.5);
        assert!(world.get_entity(coin).is_err());
        assert!(!world.resource::<EntityDirectory>().contains("Coin_0"));
    }
}
