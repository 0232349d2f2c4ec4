//! Networking core: session lifecycle, peer registry, typed wire messages,
//! the transport seam, and the driver that ties them together.
//!
//! Nothing here touches sockets. A [`Transport`] implementation moves
//! encoded [`Message`]s between peers; [`LoopbackNetwork`] provides an
//! in-process one for tests and headless runs.

pub mod driver;
pub mod loopback;
pub mod messages;
pub mod naming;
pub mod peer;
pub mod session;
pub mod transport;

pub use driver::{NetworkEvent, SessionDriver};
pub use loopback::{LoopbackNetwork, LoopbackTransport};
pub use messages::{
    Channel, Message, MessageError, PROTOCOL_VERSION, deserialize_message, serialize_message,
};
pub use naming::{LOCAL_PLAYER_NAME, collector_proxy_name, networked_player_name};
pub use peer::{HOST_DISPLAY_NAME, NetworkPeer, PeerId};
pub use session::{NetworkSession, SessionEvent, SessionState};
pub use transport::{Recipient, Transport, TransportCommand, TransportEvent};
