//! Network message types and serialization.
//!
//! Every remote procedure is a variant of the closed [`Message`] enum. Messages
//! are serialized with [`postcard`] and prefixed with a protocol version byte;
//! use [`serialize_message`] and [`deserialize_message`] for encoding.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::PeerId;

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Channel classes
// ---------------------------------------------------------------------------

/// Delivery class a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Ordered and guaranteed. Lifecycle, registration, collection.
    Reliable,
    /// Unordered and lossy. Position sync.
    Unreliable,
}

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level network message. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    // --- Collection ---
    /// Client asks the server to let `collector_name` collect `collectible`.
    RequestCollection {
        /// Directory name of the collectible.
        collectible: String,
        /// Network name of the collector.
        collector_name: String,
    },
    /// Server tells clients that `collector_name` is collecting `collectible`.
    StartCollectionRemote {
        /// Directory name of the collectible.
        collectible: String,
        /// Network name of the collector.
        collector_name: String,
    },

    // --- Registration ---
    /// Client announces itself to the server.
    RegisterPeerOnServer {
        /// The announcing peer.
        peer_id: PeerId,
        /// Its display name.
        player_name: String,
    },
    /// Server tells a client about a registered peer.
    RegisterPeerOnClient {
        /// The registered peer.
        peer_id: PeerId,
        /// Its display name.
        player_name: String,
    },
    /// Server tells clients that a peer left.
    UnregisterPeerOnClient {
        /// The departed peer.
        peer_id: PeerId,
    },

    // --- Replicas ---
    /// Create a full actor replica for `peer_id`.
    CreatePlayerForPeer {
        /// Owner of the actor.
        peer_id: PeerId,
        /// Initial world position.
        position: Vec3,
    },
    /// Create a collector proxy for `peer_id`.
    CreateProxyForPeer {
        /// Owner of the proxy.
        peer_id: PeerId,
        /// Initial world position.
        position: Vec3,
    },
    /// Authoritative proxy position.
    UpdateProxyPosition {
        /// Owner of the proxy.
        peer_id: PeerId,
        /// World position.
        position: Vec3,
    },
    /// Authoritative actor transform and velocity.
    ReceiveNetworkState {
        /// Owner of the actor.
        peer_id: PeerId,
        /// World position.
        position: Vec3,
        /// Linear velocity.
        velocity: Vec3,
    },
}

impl Message {
    /// The channel class this message must travel on.
    pub fn channel(&self) -> Channel {
        match self {
            Message::UpdateProxyPosition { .. } | Message::ReceiveNetworkState { .. } => {
                Channel::Unreliable
            }
            Message::RequestCollection { .. }
            | Message::StartCollectionRemote { .. }
            | Message::RegisterPeerOnServer { .. }
            | Message::RegisterPeerOnClient { .. }
            | Message::UnregisterPeerOnClient { .. }
            | Message::CreatePlayerForPeer { .. }
            | Message::CreateProxyForPeer { .. } => Channel::Reliable,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RequestCollection { .. } => "RequestCollection",
            Message::StartCollectionRemote { .. } => "StartCollectionRemote",
            Message::RegisterPeerOnServer { .. } => "RegisterPeerOnServer",
            Message::RegisterPeerOnClient { .. } => "RegisterPeerOnClient",
            Message::UnregisterPeerOnClient { .. } => "UnregisterPeerOnClient",
            Message::CreatePlayerForPeer { .. } => "CreatePlayerForPeer",
            Message::CreateProxyForPeer { .. } => "CreateProxyForPeer",
            Message::UpdateProxyPosition { .. } => "UpdateProxyPosition",
            Message::ReceiveNetworkState { .. } => "ReceiveNetworkState",
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard encoding or decoding failed.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded Message]`
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, MessageError> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Message`].
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    let Some((&version, body)) = data.split_first() else {
        return Err(MessageError::EmptyPayload);
    };
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_request_roundtrip() {
        let msg = Message::RequestCollection {
            collectible: "Coin3".to_string(),
            collector_name: "Player_7".to_string(),
        };
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_network_state_preserves_vectors() {
        let msg = Message::ReceiveNetworkState {
            peer_id: PeerId(4),
            position: Vec3::new(1.5, -2.25, 1000.0),
            velocity: Vec3::new(0.0, -30.0, 8.0),
        };
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_channel_classes() {
        let sync = Message::UpdateProxyPosition {
            peer_id: PeerId(2),
            position: Vec3::ZERO,
        };
        let state = Message::ReceiveNetworkState {
            peer_id: PeerId(2),
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
        };
        assert_eq!(sync.channel(), Channel::Unreliable);
        assert_eq!(state.channel(), Channel::Unreliable);

        let reliable = [
            Message::RegisterPeerOnServer {
                peer_id: PeerId(2),
                player_name: "Ana".into(),
            },
            Message::UnregisterPeerOnClient { peer_id: PeerId(2) },
            Message::CreateProxyForPeer {
                peer_id: PeerId(2),
                position: Vec3::ZERO,
            },
            Message::StartCollectionRemote {
                collectible: "Coin".into(),
                collector_name: "Player".into(),
            },
        ];
        for msg in reliable {
            assert_eq!(msg.channel(), Channel::Reliable, "{}", msg.kind());
        }
    }

    #[test]
    fn test_position_sync_is_compact() {
        let msg = Message::UpdateProxyPosition {
            peer_id: PeerId(2),
            position: Vec3::new(1.0, 2.0, 3.0),
        };
        let bytes = serialize_message(&msg).unwrap();
        assert!(bytes.len() <= 16, "got {} bytes", bytes.len());
    }

    #[test]
    fn test_version_byte_is_first_byte() {
        let msg = Message::UnregisterPeerOnClient { peer_id: PeerId(9) };
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let msg = Message::UnregisterPeerOnClient { peer_id: PeerId(9) };
        let mut bytes = serialize_message(&msg).unwrap();
        bytes[0] = 255;
        assert!(matches!(
            deserialize_message(&bytes),
            Err(MessageError::UnsupportedVersion(255))
        ));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            deserialize_message(&[]),
            Err(MessageError::EmptyPayload)
        ));
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let result = deserialize_message(&[PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(MessageError::Postcard(_))));
    }
}
