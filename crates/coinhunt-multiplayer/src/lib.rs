//! Gameplay networking on top of `coinhunt-net`: per-peer replicas, position
//! sync, server-arbitrated coin collection, and the [`GameNode`] loop that
//! drives them for one participant.

mod collection;
mod components;
mod node;
mod outbox;
mod spawner;

pub use collection::{
    collection_step, collector_network_name, detect_collectors, on_collector_entered,
    on_request_collection, on_start_collection_remote, resolve_collectible, resolve_collector,
    start_collection,
};
pub use components::{
    CoinCollector, Collectible, CollectorProxy, NetworkAuthority, PlayerMarker, RemoteReplica,
    Trajectory,
};
pub use node::GameNode;
pub use outbox::Outbox;
pub use spawner::{ReplicaKind, ReplicaSpawner};
