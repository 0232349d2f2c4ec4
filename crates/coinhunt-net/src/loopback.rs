//! In-process transport.
//!
//! A [`LoopbackNetwork`] is a shared hub; every [`LoopbackTransport`] created
//! from it is one endpoint with its own crossbeam inbox. Servers are keyed by
//! port and hand out peer ids from 2 upward. Every message goes through the
//! wire codec on send, so encoding bugs surface here exactly as they would on
//! a real socket.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::{
    Channel, Message, PeerId, Recipient, Transport, TransportCommand, TransportEvent,
    deserialize_message, serialize_message,
};

type EndpointId = u64;

/// What lands in an endpoint's inbox.
#[derive(Debug)]
enum Delivery {
    Event(TransportEvent),
    Packet { from: PeerId, bytes: Vec<u8> },
}

#[derive(Debug)]
struct ServerSlot {
    endpoint: EndpointId,
    next_peer: u32,
    clients: BTreeMap<PeerId, EndpointId>,
}

#[derive(Debug, Clone, Copy)]
enum Link {
    Server { port: u16 },
    Client { port: u16, peer: PeerId },
}

#[derive(Debug, Default)]
struct Hub {
    next_endpoint: EndpointId,
    inboxes: HashMap<EndpointId, Sender<Delivery>>,
    servers: HashMap<u16, ServerSlot>,
    links: HashMap<EndpointId, Link>,
}

impl Hub {
    fn deliver(&self, endpoint: EndpointId, delivery: Delivery) {
        if let Some(tx) = self.inboxes.get(&endpoint) {
            // A closed inbox belongs to a dropped transport.
            let _ = tx.send(delivery);
        }
    }

    fn listen(&mut self, endpoint: EndpointId, port: u16) -> bool {
        if self.servers.contains_key(&port) || self.links.contains_key(&endpoint) {
            return false;
        }
        self.servers.insert(
            port,
            ServerSlot {
                endpoint,
                next_peer: PeerId::HOST.0 + 1,
                clients: BTreeMap::new(),
            },
        );
        self.links.insert(endpoint, Link::Server { port });
        true
    }

    fn connect(&mut self, endpoint: EndpointId, port: u16) -> Option<PeerId> {
        if self.links.contains_key(&endpoint) {
            return None;
        }
        let server = self.servers.get_mut(&port)?;
        let peer = PeerId(server.next_peer);
        server.next_peer += 1;
        server.clients.insert(peer, endpoint);
        let server_endpoint = server.endpoint;
        self.links.insert(endpoint, Link::Client { port, peer });
        self.deliver(
            endpoint,
            Delivery::Event(TransportEvent::ConnectedToServer { local_id: peer }),
        );
        self.deliver(
            server_endpoint,
            Delivery::Event(TransportEvent::PeerConnected(peer)),
        );
        Some(peer)
    }

    fn close(&mut self, endpoint: EndpointId) {
        match self.links.remove(&endpoint) {
            Some(Link::Server { port }) => {
                if let Some(server) = self.servers.remove(&port) {
                    for client in server.clients.values() {
                        self.links.remove(client);
                        self.deliver(*client, Delivery::Event(TransportEvent::ServerDisconnected));
                    }
                }
            }
            Some(Link::Client { port, peer }) => {
                if let Some(server) = self.servers.get_mut(&port) {
                    server.clients.remove(&peer);
                    let server_endpoint = server.endpoint;
                    self.deliver(
                        server_endpoint,
                        Delivery::Event(TransportEvent::PeerDisconnected(peer)),
                    );
                }
            }
            None => {}
        }
    }

    /// Resolve sender id and destination endpoints for a send.
    fn route(&self, endpoint: EndpointId, recipient: Recipient) -> Option<(PeerId, Vec<EndpointId>)> {
        match *self.links.get(&endpoint)? {
            Link::Server { port } => {
                let server = self.servers.get(&port)?;
                let targets = match recipient {
                    Recipient::Server | Recipient::Peer(PeerId::HOST) => Vec::new(),
                    Recipient::Peer(peer) => server.clients.get(&peer).copied().into_iter().collect(),
                    Recipient::Broadcast => server.clients.values().copied().collect(),
                };
                Some((PeerId::HOST, targets))
            }
            Link::Client { port, peer: own } => {
                let server = self.servers.get(&port)?;
                let targets = match recipient {
                    Recipient::Server | Recipient::Peer(PeerId::HOST) => vec![server.endpoint],
                    Recipient::Peer(peer) => server.clients.get(&peer).copied().into_iter().collect(),
                    Recipient::Broadcast => std::iter::once(server.endpoint)
                        .chain(
                            server
                                .clients
                                .iter()
                                .filter(|(id, _)| **id != own)
                                .map(|(_, e)| *e),
                        )
                        .collect(),
                };
                Some((own, targets))
            }
        }
    }
}

/// Shared in-process hub. Cloning yields another handle to the same hub.
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackNetwork {
    /// A new, empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, unconnected endpoint on this hub.
    pub fn endpoint(&self) -> LoopbackTransport {
        let (tx, rx) = unbounded();
        let mut hub = self.lock();
        hub.next_endpoint += 1;
        let id = hub.next_endpoint;
        hub.inboxes.insert(id, tx);
        LoopbackTransport {
            network: self.clone(),
            endpoint: id,
            inbox: rx,
            drop_unreliable: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One endpoint of a [`LoopbackNetwork`].
#[derive(Debug)]
pub struct LoopbackTransport {
    network: LoopbackNetwork,
    endpoint: EndpointId,
    inbox: Receiver<Delivery>,
    drop_unreliable: bool,
}

impl LoopbackTransport {
    /// Drop every outbound message on the unreliable channel.
    ///
    /// Simulates a lossy link for position sync.
    pub fn set_drop_unreliable(&mut self, drop: bool) {
        self.drop_unreliable = drop;
    }

    fn push_local(&self, event: TransportEvent) {
        self.network.lock().deliver(self.endpoint, Delivery::Event(event));
    }
}

impl Transport for LoopbackTransport {
    fn execute(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::Listen { port } => {
                let bound = self.network.lock().listen(self.endpoint, port);
                if bound {
                    debug!(port, "loopback listening");
                } else {
                    warn!(port, "loopback bind failed");
                    self.push_local(TransportEvent::BindFailed { port });
                }
            }
            TransportCommand::Connect { address, port } => {
                let connected = self.network.lock().connect(self.endpoint, port);
                match connected {
                    Some(peer) => debug!(%address, port, %peer, "loopback connected"),
                    None => {
                        warn!(%address, port, "no loopback server");
                        self.push_local(TransportEvent::ConnectionFailed);
                    }
                }
            }
            TransportCommand::Close => {
                self.network.lock().close(self.endpoint);
            }
        }
    }

    fn send(&mut self, recipient: Recipient, message: &Message) {
        if self.drop_unreliable && message.channel() == Channel::Unreliable {
            return;
        }
        let bytes = match serialize_message(message) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(kind = message.kind(), %err, "failed to encode message");
                return;
            }
        };
        let hub = self.network.lock();
        let Some((from, targets)) = hub.route(self.endpoint, recipient) else {
            debug!(kind = message.kind(), "send on unconnected endpoint dropped");
            return;
        };
        for target in targets {
            hub.deliver(
                target,
                Delivery::Packet {
                    from,
                    bytes: bytes.clone(),
                },
            );
        }
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(delivery) = self.inbox.try_recv() {
            match delivery {
                Delivery::Event(event) => events.push(event),
                Delivery::Packet { from, bytes } => match deserialize_message(&bytes) {
                    Ok(message) => events.push(TransportEvent::Message { from, message }),
                    Err(err) => warn!(%from, %err, "dropping undecodable packet"),
                },
            }
        }
        events
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        let mut hub = self.network.lock();
        hub.close(self.endpoint);
        hub.inboxes.remove(&self.endpoint);
    }
}
