//! Glue between a [`NetworkSession`] and a [`Transport`].
//!
//! The driver turns session events into transport commands, runs the peer
//! registration handshake, and hands everything else to the game as an
//! ordered list of [`NetworkEvent`]s at the next [`poll`](SessionDriver::poll).
//!
//! Handshake:
//! 1. Client transport connects; the client sends `RegisterPeerOnServer`.
//! 2. Server registers the peer when the announcement arrives, under the id
//!    the transport reported for the sender. A transport connection that never
//!    announces itself is not a peer.
//! 3. Server replays every other registered peer to the newcomer and
//!    broadcasts the newcomer to everyone with `RegisterPeerOnClient`.
//! 4. When a registered client's transport drops, the server unregisters it
//!    and broadcasts `UnregisterPeerOnClient`.

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::{
    Message, NetworkPeer, NetworkSession, PeerId, Recipient, SessionEvent, Transport,
    TransportCommand, TransportEvent,
};

/// What the game sees after a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// A session lifecycle event.
    Session(SessionEvent),
    /// A gameplay message from `from`.
    Message {
        /// Sender.
        from: PeerId,
        /// Payload.
        message: Message,
    },
}

/// Owns the session and the transport for one process.
#[derive(Debug)]
pub struct SessionDriver<T: Transport> {
    session: NetworkSession,
    transport: T,
    player_name: String,
    pending: Vec<NetworkEvent>,
}

impl<T: Transport> SessionDriver<T> {
    /// A driver with an offline session. `player_name` is announced when
    /// joining a server.
    pub fn new(transport: T, player_name: impl Into<String>) -> Self {
        Self {
            session: NetworkSession::new(),
            transport,
            player_name: player_name.into(),
            pending: Vec::new(),
        }
    }

    /// The session state.
    pub fn session(&self) -> &NetworkSession {
        &self.session
    }

    /// The underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Subscribe to raw session events.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Start hosting. Resulting events are delivered on the next poll.
    pub fn host_game(&mut self, port: u16) {
        let events = self.session.host_game(port);
        self.apply(events);
    }

    /// Join a server. Resulting events are delivered on the next poll.
    pub fn join_game(&mut self, address: impl Into<String>, port: u16) {
        let events = self.session.join_game(address, port);
        self.apply(events);
    }

    /// Leave the session. Resulting events are delivered on the next poll.
    pub fn disconnect(&mut self) {
        let events = self.session.disconnect();
        self.apply(events);
    }

    /// Send a gameplay message. Dropped while offline.
    pub fn send(&mut self, recipient: Recipient, message: Message) {
        if self.session.state() == crate::SessionState::Offline {
            debug!(kind = message.kind(), "offline, message dropped");
            return;
        }
        self.transport.send(recipient, &message);
    }

    /// Drain the transport and return every event since the last poll, in
    /// order. Registration traffic is consumed here.
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        for event in self.transport.poll() {
            self.handle_transport_event(event);
        }
        std::mem::take(&mut self.pending)
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerConnected(id) => {
                debug!(%id, "transport connected, awaiting registration");
            }
            TransportEvent::PeerDisconnected(id) => {
                let events = self.session.peer_disconnected(id);
                let removed = events.contains(&SessionEvent::PeerDisconnected(id));
                self.apply(events);
                if removed {
                    self.transport
                        .send(Recipient::Broadcast, &Message::UnregisterPeerOnClient { peer_id: id });
                }
            }
            TransportEvent::ConnectedToServer { local_id } => {
                let events = self.session.connected_to_server(local_id);
                self.apply(events);
                if self.session.is_online() {
                    self.transport.send(
                        Recipient::Server,
                        &Message::RegisterPeerOnServer {
                            peer_id: local_id,
                            player_name: self.player_name.clone(),
                        },
                    );
                }
            }
            TransportEvent::ConnectionFailed | TransportEvent::BindFailed { .. } => {
                let events = self.session.connection_failed();
                self.apply(events);
            }
            TransportEvent::ServerDisconnected => {
                let events = self.session.server_disconnected();
                self.apply(events);
            }
            TransportEvent::Message { from, message } => self.handle_message(from, message),
        }
    }

    fn handle_message(&mut self, from: PeerId, message: Message) {
        match message {
            Message::RegisterPeerOnServer {
                peer_id: claimed,
                player_name,
            } => {
                if !self.session.is_hosting() {
                    debug!(%from, "RegisterPeerOnServer ignored, not hosting");
                    return;
                }
                if claimed != from {
                    warn!(%from, %claimed, "registration claimed another id, using sender");
                }
                let peer_id = from;
                let player_name = if player_name.trim().is_empty() {
                    NetworkPeer::default_name(peer_id)
                } else {
                    player_name
                };
                info!(%peer_id, %player_name, "peer registered");
                let events = self.session.peer_connected(peer_id, player_name.clone());
                self.apply(events);

                let existing: Vec<NetworkPeer> = self
                    .session
                    .peers()
                    .filter(|p| p.id != peer_id)
                    .cloned()
                    .collect();
                for peer in existing {
                    self.transport.send(
                        Recipient::Peer(peer_id),
                        &Message::RegisterPeerOnClient {
                            peer_id: peer.id,
                            player_name: peer.display_name,
                        },
                    );
                }
                self.transport.send(
                    Recipient::Broadcast,
                    &Message::RegisterPeerOnClient {
                        peer_id,
                        player_name,
                    },
                );
            }
            Message::RegisterPeerOnClient {
                peer_id,
                player_name,
            } => {
                let events = self.session.peer_listed(peer_id, player_name);
                self.apply(events);
            }
            Message::UnregisterPeerOnClient { peer_id } => {
                let events = self.session.peer_delisted(peer_id);
                self.apply(events);
            }
            message => self.pending.push(NetworkEvent::Message { from, message }),
        }
    }

    /// Forward session events to the game and map them onto transport commands.
    fn apply(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match &event {
                SessionEvent::HostingStarted { port } => {
                    self.transport.execute(TransportCommand::Listen { port: *port });
                }
                SessionEvent::JoinedGame { address, port } => {
                    self.transport.execute(TransportCommand::Connect {
                        address: address.clone(),
                        port: *port,
                    });
                }
                SessionEvent::Disconnected => self.transport.execute(TransportCommand::Close),
                SessionEvent::ConnectionFailed => {
                    warn!("connection failed, staying offline");
                    self.transport.execute(TransportCommand::Close);
                }
                SessionEvent::OnlineChanged(_)
                | SessionEvent::PeerConnected(_)
                | SessionEvent::PeerDisconnected(_) => {}
            }
            self.pending.push(NetworkEvent::Session(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoopbackNetwork, LoopbackTransport, SessionState};
    use glam::Vec3;

    fn host(network: &LoopbackNetwork) -> SessionDriver<LoopbackTransport> {
        let mut driver = SessionDriver::new(network.endpoint(), "Host");
        driver.host_game(7777);
        driver
    }

    fn client(network: &LoopbackNetwork, name: &str) -> SessionDriver<LoopbackTransport> {
        let mut driver = SessionDriver::new(network.endpoint(), name);
        driver.join_game("127.0.0.1", 7777);
        driver
    }

    fn session_events(events: &[NetworkEvent]) -> Vec<SessionEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                NetworkEvent::Session(s) => Some(s.clone()),
                NetworkEvent::Message { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_host_events_delivered_on_poll() {
        let network = LoopbackNetwork::new();
        let mut host = host(&network);
        let events = session_events(&host.poll());
        assert_eq!(
            events,
            vec![
                SessionEvent::HostingStarted { port: 7777 },
                SessionEvent::OnlineChanged(true),
                SessionEvent::PeerConnected(PeerId::HOST),
            ]
        );
        assert!(host.poll().is_empty());
    }

    #[test]
    fn test_handshake_registers_names_and_mirrors_roster() {
        let network = LoopbackNetwork::new();
        let mut host = host(&network);
        host.poll();

        let mut ana = client(&network, "Ana");
        ana.poll(); // ConnectedToServer, sends RegisterPeerOnServer
        let host_events = session_events(&host.poll());
        assert!(host_events.contains(&SessionEvent::PeerConnected(PeerId(2))));
        assert_eq!(host.session().peer(PeerId(2)).unwrap().display_name, "Ana");

        let ana_events = session_events(&ana.poll());
        assert!(ana_events.contains(&SessionEvent::PeerConnected(PeerId::HOST)));
        assert!(ana_events.contains(&SessionEvent::PeerConnected(PeerId(2))));
        assert_eq!(ana.session().local_peer_id(), PeerId(2));
        assert_eq!(ana.session().peer_count(), 2);

        let mut bo = client(&network, "Bo");
        bo.poll();
        host.poll();
        bo.poll();
        ana.poll();
        assert_eq!(bo.session().peer_count(), 3);
        assert_eq!(ana.session().peer(PeerId(3)).unwrap().display_name, "Bo");
    }

    #[test]
    fn test_client_leave_is_broadcast() {
        let network = LoopbackNetwork::new();
        let mut host = host(&network);
        let mut ana = client(&network, "Ana");
        let mut bo = client(&network, "Bo");
        for _ in 0..3 {
            host.poll();
            ana.poll();
            bo.poll();
        }
        assert_eq!(ana.session().peer_count(), 3);

        bo.disconnect();
        bo.poll();
        host.poll();
        let ana_events = session_events(&ana.poll());
        assert_eq!(ana_events, vec![SessionEvent::PeerDisconnected(PeerId(3))]);
        assert_eq!(host.session().peer_count(), 2);
    }

    #[test]
    fn test_join_without_host_fails_once() {
        let network = LoopbackNetwork::new();
        let mut lonely = client(&network, "Ana");
        let events = session_events(&lonely.poll());
        assert_eq!(
            events,
            vec![
                SessionEvent::JoinedGame {
                    address: "127.0.0.1".into(),
                    port: 7777
                },
                SessionEvent::ConnectionFailed,
            ]
        );
        assert_eq!(lonely.session().state(), SessionState::Offline);
    }

    #[test]
    fn test_bind_failure_is_connection_error() {
        let network = LoopbackNetwork::new();
        let mut first = host(&network);
        first.poll();
        let mut second = host(&network);
        let events = session_events(&second.poll());
        assert!(events.contains(&SessionEvent::ConnectionFailed));
        assert!(events.contains(&SessionEvent::OnlineChanged(false)));
        assert!(!second.session().is_online());
    }

    #[test]
    fn test_host_disconnect_drops_clients() {
        let network = LoopbackNetwork::new();
        let mut host = host(&network);
        let mut ana = client(&network, "Ana");
        host.poll();
        ana.poll();
        host.poll();
        ana.poll();

        host.disconnect();
        host.poll();
        assert_eq!(host.session().peer_count(), 0);
        assert_eq!(host.session().local_peer_id(), PeerId::HOST);

        let events = session_events(&ana.poll());
        assert!(events.contains(&SessionEvent::Disconnected));
        assert_eq!(ana.session().state(), SessionState::Offline);
        assert_eq!(ana.session().local_peer_id(), PeerId::HOST);
    }

    #[test]
    fn test_gameplay_messages_pass_through() {
        let network = LoopbackNetwork::new();
        let mut host = host(&network);
        let mut ana = client(&network, "Ana");
        host.poll();
        ana.poll();
        host.poll();

        let msg = Message::UpdateProxyPosition {
            peer_id: PeerId(2),
            position: Vec3::new(1.0, 0.0, 2.0),
        };
        ana.send(Recipient::Broadcast, msg.clone());
        let events = host.poll();
        assert_eq!(
            events,
            vec![NetworkEvent::Message {
                from: PeerId(2),
                message: msg
            }]
        );
    }

    fn connect_raw(network: &LoopbackNetwork) -> LoopbackTransport {
        let mut raw = network.endpoint();
        raw.execute(TransportCommand::Connect {
            address: "127.0.0.1".into(),
            port: 7777,
        });
        raw
    }

    #[test]
    fn test_connection_without_registration_is_not_a_peer() {
        let network = LoopbackNetwork::new();
        let mut host = host(&network);
        host.poll();

        let mut raw = connect_raw(&network);
        assert!(session_events(&host.poll()).is_empty());
        assert_eq!(host.session().peer_count(), 1);

        raw.execute(TransportCommand::Close);
        assert!(host.poll().is_empty());
        assert_eq!(host.session().peer_count(), 1);
    }

    #[test]
    fn test_registration_uses_sender_id() {
        let network = LoopbackNetwork::new();
        let mut host = host(&network);
        host.poll();

        let mut raw = connect_raw(&network);
        raw.send(
            Recipient::Server,
            &Message::RegisterPeerOnServer {
                peer_id: PeerId(9),
                player_name: "Eve".into(),
            },
        );
        let events = session_events(&host.poll());
        assert_eq!(events, vec![SessionEvent::PeerConnected(PeerId(2))]);
        assert_eq!(host.session().peer(PeerId(2)).unwrap().display_name, "Eve");
        assert!(host.session().peer(PeerId(9)).is_none());

        let replayed: Vec<PeerId> = raw
            .poll()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Message {
                    message: Message::RegisterPeerOnClient { peer_id, .. },
                    ..
                } => Some(peer_id),
                _ => None,
            })
            .collect();
        assert_eq!(replayed, vec![PeerId::HOST, PeerId(2)]);
    }
}
