//! The seam between the protocol core and whatever moves bytes.
//!
//! A transport accepts [`TransportCommand`]s derived from session events,
//! sends [`Message`]s to a [`Recipient`] on the message's own channel class,
//! and reports connection changes and inbound messages as
//! [`TransportEvent`]s when polled.

use crate::{Message, PeerId};

/// Who a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// The server only.
    Server,
    /// A single peer.
    Peer(PeerId),
    /// Every other participant.
    Broadcast,
}

/// Connection-level actions requested by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Start accepting clients.
    Listen {
        /// Port to bind.
        port: u16,
    },
    /// Connect to a server.
    Connect {
        /// Server address.
        address: String,
        /// Server port.
        port: u16,
    },
    /// Close whatever is open.
    Close,
}

/// What the transport observed since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Server side: a client connected and was assigned `PeerId`.
    PeerConnected(PeerId),
    /// Server side: a client went away.
    PeerDisconnected(PeerId),
    /// Client side: the server accepted us.
    ConnectedToServer {
        /// Id the server assigned to this process.
        local_id: PeerId,
    },
    /// Client side: the server could not be reached.
    ConnectionFailed,
    /// Server side: the port could not be bound.
    BindFailed {
        /// The requested port.
        port: u16,
    },
    /// Client side: the server closed.
    ServerDisconnected,
    /// A decoded message arrived.
    Message {
        /// Sender.
        from: PeerId,
        /// Payload.
        message: Message,
    },
}

/// Moves messages between peers.
pub trait Transport {
    /// Apply a connection-level command.
    fn execute(&mut self, command: TransportCommand);

    /// Queue `message` for `recipient` on [`Message::channel`].
    fn send(&mut self, recipient: Recipient, message: &Message);

    /// Drain everything that arrived since the last poll, in arrival order.
    fn poll(&mut self) -> Vec<TransportEvent>;
}
