//! Directory naming contract shared by every participant.
//!
//! The own actor is always registered as `"Player"`. Any peer's actor is
//! referred to over the network as `"Player_<id>"`, and collector proxies as
//! `"CollectorProxy_<id>"`.

use crate::PeerId;

/// Directory name of the locally controlled actor.
pub const LOCAL_PLAYER_NAME: &str = "Player";

/// Network-facing name of a peer's actor.
pub fn networked_player_name(peer: PeerId) -> String {
    format!("{LOCAL_PLAYER_NAME}_{}", peer.0)
}

/// Directory name of a peer's collector proxy.
pub fn collector_proxy_name(peer: PeerId) -> String {
    format!("CollectorProxy_{}", peer.0)
}
