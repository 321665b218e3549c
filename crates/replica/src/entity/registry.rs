use std::collections::{BTreeMap, HashMap};

use super::component::{
    CollidableState, ComponentData, Fields, MetaDataState, PropertyBag, PropertyValue,
    TransformState,
};
use super::error::ComponentError;
use crate::types::{EntityId, MapId, NetId};

pub type ConstructFn = fn() -> ComponentData;
pub type LoadFn = fn(&mut ComponentData, &Fields) -> Result<(), ComponentError>;
pub type HookFn = fn(EntityId, &mut ComponentData) -> Result<(), ComponentError>;

/// Per-type dispatch table, resolved once when the type is registered.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub net_id: NetId,
    pub net_synced: bool,
    pub construct: ConstructFn,
    pub load: LoadFn,
    pub initialize: Option<HookFn>,
    pub startup: Option<HookFn>,
}

impl Registration {
    pub fn new(name: impl Into<String>, net_id: NetId, construct: ConstructFn) -> Self {
        Self {
            name: name.into(),
            net_id,
            net_synced: true,
            construct,
            load: reject_fields,
            initialize: None,
            startup: None,
        }
    }

    pub fn with_load(mut self, load: LoadFn) -> Self {
        self.load = load;
        self
    }

    pub fn with_initialize(mut self, hook: HookFn) -> Self {
        self.initialize = Some(hook);
        self
    }

    pub fn with_startup(mut self, hook: HookFn) -> Self {
        self.startup = Some(hook);
        self
    }

    pub fn net_synced(mut self, synced: bool) -> Self {
        self.net_synced = synced;
        self
    }
}

/// Component types known to this session, keyed by wire id. Both peers must
/// build identical registries.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    by_net_id: BTreeMap<NetId, Registration>,
    by_name: HashMap<String, NetId>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// Registry holding the builtin transform, metadata and collidable types.
    pub fn new() -> Self {
        let mut registry = Self {
            by_net_id: BTreeMap::new(),
            by_name: HashMap::new(),
        };
        for registration in builtins() {
            registry.insert(registration);
        }
        registry
    }

    pub fn register(&mut self, registration: Registration) -> Result<(), ComponentError> {
        if self.by_net_id.contains_key(&registration.net_id)
            || self.by_name.contains_key(&registration.name)
        {
            return Err(ComponentError::DuplicateRegistration {
                name: registration.name,
                net_id: registration.net_id,
            });
        }
        self.insert(registration);
        Ok(())
    }

    /// Registers a content component backed by a [`PropertyBag`].
    pub fn register_properties(
        &mut self,
        name: impl Into<String>,
        net_id: NetId,
    ) -> Result<(), ComponentError> {
        self.register(
            Registration::new(name, net_id, || {
                ComponentData::Properties(PropertyBag::default())
            })
            .with_load(load_properties),
        )
    }

    fn insert(&mut self, registration: Registration) {
        self.by_name
            .insert(registration.name.clone(), registration.net_id);
        self.by_net_id.insert(registration.net_id, registration);
    }

    pub fn get(&self, net_id: NetId) -> Option<&Registration> {
        self.by_net_id.get(&net_id)
    }

    pub fn by_name(&self, name: &str) -> Result<&Registration, ComponentError> {
        self.by_name
            .get(name)
            .and_then(|net_id| self.by_net_id.get(net_id))
            .ok_or_else(|| ComponentError::UnknownName(name.to_string()))
    }

    pub fn lookup(&self, net_id: NetId) -> Result<&Registration, ComponentError> {
        self.get(net_id).ok_or(ComponentError::UnknownNetId(net_id))
    }

    pub fn construct(&self, net_id: NetId) -> Result<ComponentData, ComponentError> {
        Ok((self.lookup(net_id)?.construct)())
    }

    pub fn is_mandatory(net_id: NetId) -> bool {
        net_id == NetId::TRANSFORM || net_id == NetId::METADATA
    }

    pub fn len(&self) -> usize {
        self.by_net_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_net_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.by_net_id.values()
    }
}

fn builtins() -> [Registration; 3] {
    [
        Registration::new("transform", NetId::TRANSFORM, || {
            ComponentData::Transform(TransformState::default())
        })
        .with_load(load_transform),
        Registration::new("metadata", NetId::METADATA, || {
            ComponentData::MetaData(MetaDataState::default())
        })
        .with_load(load_metadata),
        Registration::new("collidable", NetId::COLLIDABLE, || {
            ComponentData::Collidable(CollidableState::default())
        })
        .with_load(load_collidable),
    ]
}

fn field_error(component: &str, field: &str, expected: &'static str) -> ComponentError {
    ComponentError::FieldType {
        component: component.to_string(),
        field: field.to_string(),
        expected,
    }
}

fn unknown_field(component: &str, field: &str) -> ComponentError {
    ComponentError::UnknownField {
        component: component.to_string(),
        field: field.to_string(),
    }
}

fn mismatched(data: &ComponentData, expected: &str) -> ComponentError {
    ComponentError::Hook {
        component: expected.to_string(),
        reason: format!("constructed {} state", data.kind()),
    }
}

fn reject_fields(data: &mut ComponentData, fields: &Fields) -> Result<(), ComponentError> {
    match fields.keys().next() {
        Some(field) => Err(unknown_field(data.kind(), field)),
        None => Ok(()),
    }
}

fn load_transform(data: &mut ComponentData, fields: &Fields) -> Result<(), ComponentError> {
    let Some(state) = data.as_transform_mut() else {
        return Err(mismatched(data, "transform"));
    };
    for (field, value) in fields {
        match field.as_str() {
            "position" => {
                let position = value
                    .as_vec2()
                    .ok_or_else(|| field_error("transform", field, "a 2d vector"))?;
                state.set_local_position(position);
            }
            "rotation" => {
                state.rotation = value
                    .as_float()
                    .ok_or_else(|| field_error("transform", field, "a number"))?;
            }
            "map" => {
                let map = value
                    .as_int()
                    .and_then(|map| u32::try_from(map).ok())
                    .ok_or_else(|| field_error("transform", field, "a map id"))?;
                state.map = MapId(map);
            }
            _ => return Err(unknown_field("transform", field)),
        }
    }
    Ok(())
}

fn load_metadata(data: &mut ComponentData, fields: &Fields) -> Result<(), ComponentError> {
    let Some(state) = data.as_metadata_mut() else {
        return Err(mismatched(data, "metadata"));
    };
    for (field, value) in fields {
        match field.as_str() {
            "name" => {
                state.name = value
                    .as_text()
                    .ok_or_else(|| field_error("metadata", field, "a string"))?
                    .to_string();
            }
            _ => return Err(unknown_field("metadata", field)),
        }
    }
    Ok(())
}

fn load_collidable(data: &mut ComponentData, fields: &Fields) -> Result<(), ComponentError> {
    let Some(state) = data.as_collidable_mut() else {
        return Err(mismatched(data, "collidable"));
    };
    for (field, value) in fields {
        match field.as_str() {
            "half_extents" => {
                let extents = value
                    .as_vec2()
                    .ok_or_else(|| field_error("collidable", field, "a 2d vector"))?;
                state.half_extents = extents.abs().to_array();
            }
            "hard" => {
                state.hard = value
                    .as_bool()
                    .ok_or_else(|| field_error("collidable", field, "a bool"))?;
            }
            "layer" => {
                state.layer = value
                    .as_int()
                    .and_then(|layer| u32::try_from(layer).ok())
                    .ok_or_else(|| field_error("collidable", field, "a layer mask"))?;
            }
            _ => return Err(unknown_field("collidable", field)),
        }
    }
    Ok(())
}

fn load_properties(data: &mut ComponentData, fields: &Fields) -> Result<(), ComponentError> {
    let Some(bag) = data.as_properties_mut() else {
        return Err(mismatched(data, "properties"));
    };
    for (field, value) in fields {
        bag.set(field, value.clone());
    }
    Ok(())
}
