//! Peer identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Display name registered for the host when hosting starts.
pub const HOST_DISPLAY_NAME: &str = "Host";

/// Unique positive identifier of a participant in a session.
///
/// `1` is reserved for the host/server and is also the local id while
/// offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl PeerId {
    /// The host/server.
    pub const HOST: PeerId = PeerId(1);

    /// Whether this is the host id.
    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::HOST
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPeer {
    /// Session-unique id.
    pub id: PeerId,
    /// Name announced by the peer.
    pub display_name: String,
}

impl NetworkPeer {
    /// Creates a peer record.
    pub fn new(id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    /// Name used for a peer that announces an empty one.
    pub fn default_name(id: PeerId) -> String {
        format!("Player{}", id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_id_is_one() {
        assert_eq!(PeerId::HOST, PeerId(1));
        assert!(PeerId(1).is_host());
        assert!(!PeerId(2).is_host());
        assert_eq!(PeerId::default(), PeerId::HOST);
    }

    #[test]
    fn test_default_name() {
        assert_eq!(NetworkPeer::default_name(PeerId(7)), "Player7");
    }

    #[test]
    fn test_peer_id_serializes_as_number() {
        assert_eq!(serde_json::to_string(&PeerId(42)).unwrap(), "42");
    }
}
