//! Entity identity, components and the store that owns them.

mod component;
mod entity;
mod error;
mod prototype;
mod registry;
mod store;
mod system;

pub use component::{
    CollidableState, Component, ComponentData, Fields, MetaDataState, Property, PropertyBag,
    PropertyValue, TransformState,
};
pub use entity::{Entity, EntityHandle};
pub use error::{ComponentError, EntityError};
pub use prototype::{ComponentSpec, Prototype, PrototypeResolver, PrototypeSet};
pub use registry::{ComponentRegistry, ConstructFn, HookFn, LoadFn, Registration};
pub use store::{Coordinates, EntityStore};
pub use system::EntitySystem;

pub(crate) use store::run_hooks;
