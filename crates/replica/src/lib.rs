pub mod config;
pub mod entity;
pub mod net;
pub mod simulation;
pub mod spatial;
pub mod state;
pub mod types;

pub use config::ReplicationConfig;
pub use entity::{
    Component, ComponentData, ComponentError, ComponentRegistry, Coordinates, Entity,
    EntityError, EntityHandle, EntityStore, EntitySystem, PropertyValue, Prototype,
    PrototypeResolver, PrototypeSet, Registration,
};
pub use net::{
    ChannelTransport, CodecError, DeliveryChannel, GameState, Ingress, MirrorState,
    PacketLossSimulation, PeerId, ReplicationStats, StateCodec, Transport, TransportError,
};
pub use simulation::{FixedTimestep, MessageOutcome, ReplicationClient, ReplicationHost};
pub use spatial::{Box2, DynamicTree, GrowthPolicy, SpatialIndex};
pub use types::{EntityId, MapId, NetId, Tick};
