//! Wire types, state message framing and the receive path.

mod apply;
mod buffer;
mod codec;
mod peer;
mod protocol;
mod stats;
mod transport;
pub mod varint;

pub use apply::{ApplyOutcome, ApplyReport, DrainReport, MirrorState};
pub use buffer::{IncomingBuffer, IncomingEntityMessage};
pub use codec::{CodecError, PayloadCompression, StateCodec, StateMessage, ZstdCompression};
pub use peer::{Peer, PeerError, PeerId, PeerRegistry};
pub use protocol::{ComponentChanged, ComponentState, DeletionEntry, EntityState, GameState};
pub use stats::ReplicationStats;
pub use transport::{
    ChannelTransport, Datagram, DeliveryChannel, Ingress, IngressQueue, PacketLossSimulation,
    Transport, TransportError, ingress_channel,
};
