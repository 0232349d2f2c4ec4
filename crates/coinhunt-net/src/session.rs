//! Connection lifecycle and peer registry.
//!
//! [`NetworkSession`] is a small state machine: `Offline → Hosting | Client`,
//! and back to `Offline` on every disconnect path. Each operation returns the
//! [`SessionEvent`]s it produced, in order, and publishes the same events to
//! every live subscriber.

use std::collections::BTreeMap;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info, warn};

use crate::{HOST_DISPLAY_NAME, NetworkPeer, PeerId};

/// Connection state of the local process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection.
    #[default]
    Offline,
    /// Acting as the server.
    Hosting,
    /// Joined, or joining, a server.
    Client,
}

/// Events produced by session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport should start listening.
    HostingStarted {
        /// Port to listen on.
        port: u16,
    },
    /// The transport should connect.
    JoinedGame {
        /// Server address.
        address: String,
        /// Server port.
        port: u16,
    },
    /// Binding or connecting failed; the session is offline again.
    ConnectionFailed,
    /// The session was torn down; the transport should close.
    Disconnected,
    /// `is_online` flipped.
    OnlineChanged(bool),
    /// A peer was registered.
    PeerConnected(PeerId),
    /// A peer was removed.
    PeerDisconnected(PeerId),
}

/// Connection FSM plus the registry of known peers.
#[derive(Debug, Default)]
pub struct NetworkSession {
    state: SessionState,
    online: bool,
    local_peer_id: PeerId,
    peers: BTreeMap<PeerId, NetworkPeer>,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl NetworkSession {
    /// A new offline session with local id 1.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether this process is the server.
    pub fn is_hosting(&self) -> bool {
        self.state == SessionState::Hosting
    }

    /// Whether this process joined (or is joining) a server.
    pub fn is_client(&self) -> bool {
        self.state == SessionState::Client
    }

    /// Whether connectivity is confirmed.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// The local peer id. `1` while offline.
    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// Look up a registered peer.
    pub fn peer(&self, id: PeerId) -> Option<&NetworkPeer> {
        self.peers.get(&id)
    }

    /// Registered peers in ascending id order.
    pub fn peers(&self) -> impl Iterator<Item = &NetworkPeer> {
        self.peers.values()
    }

    /// Number of registered peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Receive every event this session produces from now on.
    ///
    /// Dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    // -----------------------------------------------------------------------
    // Offline inputs
    // -----------------------------------------------------------------------

    /// Start hosting on `port`. Ignored unless offline.
    pub fn host_game(&mut self, port: u16) -> Vec<SessionEvent> {
        if self.state != SessionState::Offline {
            debug!(state = ?self.state, "host_game ignored");
            return Vec::new();
        }
        info!(port, "hosting started");
        let mut events = vec![SessionEvent::HostingStarted { port }];
        self.state = SessionState::Hosting;
        self.local_peer_id = PeerId::HOST;
        self.set_online(true, &mut events);
        self.register(PeerId::HOST, HOST_DISPLAY_NAME.to_string(), &mut events);
        self.publish(events)
    }

    /// Join the server at `address:port`. Ignored unless offline.
    ///
    /// The session is not online until [`connected_to_server`](Self::connected_to_server).
    pub fn join_game(&mut self, address: impl Into<String>, port: u16) -> Vec<SessionEvent> {
        if self.state != SessionState::Offline {
            debug!(state = ?self.state, "join_game ignored");
            return Vec::new();
        }
        let address = address.into();
        info!(%address, port, "joining game");
        self.state = SessionState::Client;
        self.publish(vec![SessionEvent::JoinedGame { address, port }])
    }

    // -----------------------------------------------------------------------
    // Hosting inputs
    // -----------------------------------------------------------------------

    /// Register (or rename) a remote peer. Only effective while hosting.
    pub fn peer_connected(
        &mut self,
        id: PeerId,
        display_name: impl Into<String>,
    ) -> Vec<SessionEvent> {
        if self.state != SessionState::Hosting {
            debug!(%id, "peer_connected ignored outside hosting");
            return Vec::new();
        }
        let mut events = Vec::new();
        self.register(id, display_name.into(), &mut events);
        self.publish(events)
    }

    /// Remove a remote peer. Only effective while hosting.
    pub fn peer_disconnected(&mut self, id: PeerId) -> Vec<SessionEvent> {
        if self.state != SessionState::Hosting {
            debug!(%id, "peer_disconnected ignored outside hosting");
            return Vec::new();
        }
        let mut events = Vec::new();
        self.unregister(id, &mut events);
        self.publish(events)
    }

    // -----------------------------------------------------------------------
    // Client inputs
    // -----------------------------------------------------------------------

    /// The transport reached the server and assigned `local_id`.
    pub fn connected_to_server(&mut self, local_id: PeerId) -> Vec<SessionEvent> {
        if self.state != SessionState::Client {
            debug!(%local_id, "connected_to_server ignored outside client");
            return Vec::new();
        }
        info!(%local_id, "connected to server");
        let mut events = Vec::new();
        self.local_peer_id = local_id;
        self.set_online(true, &mut events);
        self.publish(events)
    }

    /// Mirror a peer the server announced. Only effective as a client.
    pub fn peer_listed(&mut self, id: PeerId, display_name: impl Into<String>) -> Vec<SessionEvent> {
        if self.state != SessionState::Client {
            return Vec::new();
        }
        let mut events = Vec::new();
        self.register(id, display_name.into(), &mut events);
        self.publish(events)
    }

    /// Drop a peer the server reported as gone. Only effective as a client.
    pub fn peer_delisted(&mut self, id: PeerId) -> Vec<SessionEvent> {
        if self.state != SessionState::Client {
            return Vec::new();
        }
        let mut events = Vec::new();
        self.unregister(id, &mut events);
        self.publish(events)
    }

    /// The server went away.
    pub fn server_disconnected(&mut self) -> Vec<SessionEvent> {
        if self.state != SessionState::Client {
            return Vec::new();
        }
        warn!("server disconnected");
        let mut events = vec![SessionEvent::Disconnected];
        self.reset(&mut events);
        self.publish(events)
    }

    // -----------------------------------------------------------------------
    // Shared inputs
    // -----------------------------------------------------------------------

    /// Binding (hosting) or connecting (client) failed. No retry is made.
    pub fn connection_failed(&mut self) -> Vec<SessionEvent> {
        if self.state == SessionState::Offline {
            return Vec::new();
        }
        warn!(state = ?self.state, "connection failed");
        let mut events = vec![SessionEvent::ConnectionFailed];
        self.reset(&mut events);
        self.publish(events)
    }

    /// Leave the session. Clears every peer and resets the local id.
    pub fn disconnect(&mut self) -> Vec<SessionEvent> {
        if self.state == SessionState::Offline {
            return Vec::new();
        }
        info!(state = ?self.state, "disconnecting");
        let mut events = vec![SessionEvent::Disconnected];
        self.reset(&mut events);
        self.publish(events)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn register(&mut self, id: PeerId, display_name: String, events: &mut Vec<SessionEvent>) {
        let is_new = self
            .peers
            .insert(id, NetworkPeer::new(id, display_name))
            .is_none();
        if is_new {
            debug!(%id, "peer registered");
            events.push(SessionEvent::PeerConnected(id));
        }
    }

    fn unregister(&mut self, id: PeerId, events: &mut Vec<SessionEvent>) {
        if self.peers.remove(&id).is_some() {
            debug!(%id, "peer unregistered");
            events.push(SessionEvent::PeerDisconnected(id));
        }
    }

    fn set_online(&mut self, online: bool, events: &mut Vec<SessionEvent>) {
        if self.online != online {
            self.online = online;
            events.push(SessionEvent::OnlineChanged(online));
        }
    }

    fn reset(&mut self, events: &mut Vec<SessionEvent>) {
        self.peers.clear();
        self.state = SessionState::Offline;
        self.local_peer_id = PeerId::HOST;
        self.set_online(false, events);
    }

    fn publish(&mut self, events: Vec<SessionEvent>) -> Vec<SessionEvent> {
        if !events.is_empty() {
            self.subscribers
                .retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
        }
        events
    }
}
